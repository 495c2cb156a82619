//! Telemetry model: machines and the snapshots they report.

use serde::{Deserialize, Serialize};

use crate::types::{MachineId, Timestamp};

/// Failure label used when a reading carries no failure.
pub const LABEL_NORMAL: &str = "Normal";

/// Failure label used when the target flag is set but no cause flag is.
pub const LABEL_UNKNOWN_FAILURE: &str = "Unknown Failure";

/// A machine registered in the asset registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub model_name: String,
    /// Asset type / location tag; not every machine has one.
    pub location: Option<String>,
    pub install_date: Timestamp,
}

/// One timestamped telemetry reading for one machine.
///
/// Sensor readings are optional because the store may hold NULLs; threshold
/// rules treat a missing reading as "does not fire".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub machine_id: MachineId,
    pub timestamp: Timestamp,
    pub air_temp_k: Option<f64>,
    pub process_temp_k: Option<f64>,
    pub rpm: Option<f64>,
    pub torque_nm: Option<f64>,
    pub tool_wear_min: Option<f64>,
    /// Binary "machine failure" flag from the source dataset.
    pub target: bool,
    pub failure_type: Option<String>,
}

impl TelemetrySnapshot {
    /// Process temperature converted to degrees Celsius.
    pub fn process_temp_c(&self) -> Option<f64> {
        self.process_temp_k.map(kelvin_to_celsius)
    }

    /// Failure label, defaulting to [`LABEL_NORMAL`].
    pub fn failure_label(&self) -> &str {
        self.failure_type.as_deref().unwrap_or(LABEL_NORMAL)
    }
}

/// Convert Kelvin to Celsius.
pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - crate::thresholds::KELVIN_OFFSET
}

/// Per-cause failure flags carried by AI4I-style source rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureFlags {
    /// Tool wear failure.
    pub twf: bool,
    /// Heat dissipation failure.
    pub hdf: bool,
    /// Power failure.
    pub pwf: bool,
    /// Overstrain failure.
    pub osf: bool,
    /// Random failure.
    pub rnf: bool,
}

impl FailureFlags {
    /// Resolve the human-readable failure label for a row.
    ///
    /// Cause flags are checked in dataset column order; the first set flag
    /// wins. A row whose target flag is clear is always [`LABEL_NORMAL`].
    pub fn label(&self, target: bool) -> &'static str {
        if !target {
            return LABEL_NORMAL;
        }
        if self.twf {
            "Tool Wear Failure (TWF)"
        } else if self.hdf {
            "Heat Dissipation Failure (HDF)"
        } else if self.pwf {
            "Power Failure (PWF)"
        } else if self.osf {
            "Overstrain Failure (OSF)"
        } else if self.rnf {
            "Random Failure (RNF)"
        } else {
            LABEL_UNKNOWN_FAILURE
        }
    }
}
