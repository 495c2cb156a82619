//! Failure verdicts, severities, and machine status roll-up.
//!
//! A [`FailureVerdict`] is always derived from a concrete
//! [`TelemetrySnapshot`] by [`crate::thresholds::evaluate`]; nothing in this
//! module creates one from thin air.

use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySnapshot;
use crate::types::{MachineId, Timestamp};

// ---------------------------------------------------------------------------
// FailureKind
// ---------------------------------------------------------------------------

/// The closed set of failure classes the threshold rules can produce.
///
/// Declaration order is priority order (highest first), so the derived
/// `Ord` sorts verdicts by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Thermal,
    FanFailure,
    MotorStrain,
    ToolWear,
}

impl FailureKind {
    /// Every kind, in priority order.
    pub const ALL: [FailureKind; 4] = [
        FailureKind::Thermal,
        FailureKind::FanFailure,
        FailureKind::MotorStrain,
        FailureKind::ToolWear,
    ];

    /// Stable anomaly code used in reports and manual lookups.
    pub fn code(self) -> &'static str {
        match self {
            Self::Thermal => "TR-001",
            Self::FanFailure => "FF-001",
            Self::MotorStrain => "MS-001",
            Self::ToolWear => "TW-001",
        }
    }

    /// Human-readable failure label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Thermal => "Thermal Runaway",
            Self::FanFailure => "Fan Failure",
            Self::MotorStrain => "Motor Strain",
            Self::ToolWear => "Tool Wear",
        }
    }

    /// Knowledge-base query fragment describing this failure.
    pub fn retrieval_key(self) -> &'static str {
        match self {
            Self::Thermal => "thermal runaway / heater not reaching setpoint",
            Self::FanFailure => "fan failure / extruder fan error",
            Self::MotorStrain => "motor strain / mechanical jam",
            Self::ToolWear => "tool wear / tool replacement",
        }
    }

    /// Field action recommended for this failure.
    pub fn recommended_action(self) -> &'static str {
        match self {
            Self::Thermal => {
                "Stop the machine. Inspect heater cartridge, thermistor seating and wiring harness. \
                 Verify PSU output and the mainboard heater MOSFET."
            }
            Self::FanFailure => {
                "Check fan power connection, debris blockage, and fan motor. Replace if necessary."
            }
            Self::MotorStrain => {
                "Check for mechanical obstructions, belt tension, and motor condition. Reduce load if possible."
            }
            Self::ToolWear => "Schedule tool replacement to prevent failure.",
        }
    }

    /// Parse a short operator name (`thermal`, `fan`, `strain`, `wear`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "thermal" | "thermal_runaway" | "tr-001" => Some(Self::Thermal),
            "fan" | "fan_failure" | "ff-001" => Some(Self::FanFailure),
            "strain" | "motor_strain" | "ms-001" => Some(Self::MotorStrain),
            "wear" | "tool_wear" | "tw-001" => Some(Self::ToolWear),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Verdict severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

// ---------------------------------------------------------------------------
// FailureVerdict
// ---------------------------------------------------------------------------

/// A single fired threshold rule for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureVerdict {
    pub kind: FailureKind,
    pub machine_id: MachineId,
    /// Timestamp of the triggering snapshot.
    pub timestamp: Timestamp,
    pub severity: Severity,
    /// The reading that tripped the rule.
    pub observed: f64,
    /// The configured bound it was compared against.
    pub limit: f64,
    pub description: String,
}

impl FailureVerdict {
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Query text for the knowledge base, e.g. `FF-001 fan failure / extruder fan error`.
    pub fn retrieval_query(&self) -> String {
        format!("{} {}", self.kind.code(), self.kind.retrieval_key())
    }
}

/// Pick the highest-priority verdict for single-line summaries.
pub fn primary(verdicts: &[FailureVerdict]) -> Option<&FailureVerdict> {
    verdicts.iter().min_by_key(|v| v.kind)
}

// ---------------------------------------------------------------------------
// MachineStatus
// ---------------------------------------------------------------------------

/// Overall machine status derived from its verdict set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MachineStatus {
    Normal,
    Caution,
    Warning,
    Critical,
    /// No telemetry to judge from. Never conflated with `Normal`.
    Unknown,
}

impl MachineStatus {
    /// Roll up a verdict set: any critical verdict makes the machine
    /// critical, any high one a warning, anything else a caution.
    pub fn from_verdicts(verdicts: &[FailureVerdict]) -> Self {
        match verdicts.iter().map(|v| v.severity).max() {
            Some(Severity::Critical) => Self::Critical,
            Some(Severity::High) => Self::Warning,
            Some(Severity::Medium) => Self::Caution,
            None => Self::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Caution => "CAUTION",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether the machine needs attention.
    pub fn is_flagged(self) -> bool {
        !matches!(self, Self::Normal)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Result of classifying one machine's current telemetry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Classification {
    /// The machine exists but has no telemetry yet.
    NoData { machine_id: MachineId },
    /// Rules were evaluated against `snapshot`; an empty set means nominal.
    Evaluated {
        snapshot: TelemetrySnapshot,
        verdicts: Vec<FailureVerdict>,
    },
}

impl Classification {
    pub fn machine_id(&self) -> MachineId {
        match self {
            Self::NoData { machine_id } => *machine_id,
            Self::Evaluated { snapshot, .. } => snapshot.machine_id,
        }
    }

    /// Fired verdicts; empty for both nominal and no-data states.
    pub fn verdicts(&self) -> &[FailureVerdict] {
        match self {
            Self::NoData { .. } => &[],
            Self::Evaluated { verdicts, .. } => verdicts,
        }
    }

    pub fn snapshot(&self) -> Option<&TelemetrySnapshot> {
        match self {
            Self::NoData { .. } => None,
            Self::Evaluated { snapshot, .. } => Some(snapshot),
        }
    }

    /// True only when telemetry exists and no rule fired.
    pub fn is_nominal(&self) -> bool {
        matches!(self, Self::Evaluated { verdicts, .. } if verdicts.is_empty())
    }

    pub fn primary(&self) -> Option<&FailureVerdict> {
        primary(self.verdicts())
    }

    pub fn status(&self) -> MachineStatus {
        match self {
            Self::NoData { .. } => MachineStatus::Unknown,
            Self::Evaluated { verdicts, .. } => MachineStatus::from_verdicts(verdicts),
        }
    }
}
