//! Physical threshold rules for machine telemetry.
//!
//! Pure logic, no I/O. Each rule is a total predicate over one
//! [`TelemetrySnapshot`]: a missing reading means the rule does not fire.

use crate::config::env_parse;
use crate::error::CoreError;
use crate::telemetry::TelemetrySnapshot;
use crate::verdict::{FailureKind, FailureVerdict, Severity};

/// Offset between Kelvin and Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Minimum healthy printing temperature in Celsius.
pub const THERMAL_FLOOR_C: f64 = 190.0;

/// [`THERMAL_FLOOR_C`] in Kelvin (463.15 K).
pub const THERMAL_FLOOR_K: f64 = KELVIN_OFFSET + THERMAL_FLOOR_C;

/// Process temperature at or above which a machine counts as active (~157 °C).
pub const ACTIVE_PROCESS_TEMP_MIN_K: f64 = 430.0;

/// Torque above which the motor is strained.
pub const MAX_TORQUE_NM: f64 = 60.0;

/// Multiple of [`MAX_TORQUE_NM`] beyond which motor strain is critical.
pub const CRITICAL_TORQUE_FACTOR: f64 = 1.5;

/// Cumulative tool wear after which the tool is due for replacement.
pub const TOOL_WEAR_LIMIT_MIN: f64 = 200.0;

// ---------------------------------------------------------------------------
// ThresholdConfig
// ---------------------------------------------------------------------------

/// Rule thresholds. `Default` uses the named constants above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdConfig {
    pub thermal_floor_k: f64,
    pub active_process_temp_min_k: f64,
    pub max_torque_nm: f64,
    pub critical_torque_factor: f64,
    pub tool_wear_limit_min: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            thermal_floor_k: THERMAL_FLOOR_K,
            active_process_temp_min_k: ACTIVE_PROCESS_TEMP_MIN_K,
            max_torque_nm: MAX_TORQUE_NM,
            critical_torque_factor: CRITICAL_TORQUE_FACTOR,
            tool_wear_limit_min: TOOL_WEAR_LIMIT_MIN,
        }
    }
}

impl ThresholdConfig {
    /// Load overrides from the environment, falling back to defaults.
    ///
    /// | Env var                     | Default  |
    /// |-----------------------------|----------|
    /// | `THERMAL_FLOOR_K`           | `463.15` |
    /// | `ACTIVE_PROCESS_TEMP_MIN_K` | `430.0`  |
    /// | `MAX_TORQUE_NM`             | `60.0`   |
    /// | `TOOL_WEAR_LIMIT_MIN`       | `200.0`  |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();
        let config = Self {
            thermal_floor_k: env_parse("THERMAL_FLOOR_K", defaults.thermal_floor_k)?,
            active_process_temp_min_k: env_parse(
                "ACTIVE_PROCESS_TEMP_MIN_K",
                defaults.active_process_temp_min_k,
            )?,
            max_torque_nm: env_parse("MAX_TORQUE_NM", defaults.max_torque_nm)?,
            critical_torque_factor: defaults.critical_torque_factor,
            tool_wear_limit_min: env_parse("TOOL_WEAR_LIMIT_MIN", defaults.tool_wear_limit_min)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject non-finite or non-positive thresholds, and an activity
    /// threshold at or above the thermal floor (the Thermal rule could never
    /// fire).
    pub fn validate(&self) -> Result<(), CoreError> {
        let fields = [
            ("thermal_floor_k", self.thermal_floor_k),
            ("active_process_temp_min_k", self.active_process_temp_min_k),
            ("max_torque_nm", self.max_torque_nm),
            ("critical_torque_factor", self.critical_torque_factor),
            ("tool_wear_limit_min", self.tool_wear_limit_min),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(CoreError::InvalidParameter(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if self.critical_torque_factor < 1.0 {
            return Err(CoreError::InvalidParameter(
                "critical_torque_factor must be at least 1.0".into(),
            ));
        }
        if self.active_process_temp_min_k >= self.thermal_floor_k {
            return Err(CoreError::InvalidParameter(format!(
                "active_process_temp_min_k ({}) must be below thermal_floor_k ({})",
                self.active_process_temp_min_k, self.thermal_floor_k
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Whether the machine is in its heated operating regime.
pub fn is_active(snap: &TelemetrySnapshot, cfg: &ThresholdConfig) -> bool {
    snap.process_temp_k
        .is_some_and(|t| t >= cfg.active_process_temp_min_k)
}

/// Active, but process temperature has sagged below the thermal floor.
pub fn thermal_fires(snap: &TelemetrySnapshot, cfg: &ThresholdConfig) -> bool {
    is_active(snap, cfg) && snap.process_temp_k.is_some_and(|t| t < cfg.thermal_floor_k)
}

/// Active, but the spindle/fan is not turning.
pub fn fan_failure_fires(snap: &TelemetrySnapshot, cfg: &ThresholdConfig) -> bool {
    is_active(snap, cfg) && snap.rpm == Some(0.0)
}

pub fn motor_strain_fires(snap: &TelemetrySnapshot, cfg: &ThresholdConfig) -> bool {
    snap.torque_nm.is_some_and(|t| t > cfg.max_torque_nm)
}

pub fn tool_wear_fires(snap: &TelemetrySnapshot, cfg: &ThresholdConfig) -> bool {
    snap.tool_wear_min.is_some_and(|w| w > cfg.tool_wear_limit_min)
}

/// Evaluate every rule against one snapshot.
///
/// The result is sorted by priority and holds at most one verdict per kind.
/// An empty vector means nominal.
pub fn evaluate(snap: &TelemetrySnapshot, cfg: &ThresholdConfig) -> Vec<FailureVerdict> {
    let mut verdicts = Vec::new();

    if thermal_fires(snap, cfg) {
        if let Some(temp) = snap.process_temp_k {
            verdicts.push(verdict(
                snap,
                FailureKind::Thermal,
                Severity::Critical,
                temp,
                cfg.thermal_floor_k,
                format!(
                    "Process temperature {:.1}°C is below the {:.1}°C floor while heating",
                    temp - KELVIN_OFFSET,
                    cfg.thermal_floor_k - KELVIN_OFFSET,
                ),
            ));
        }
    }

    if fan_failure_fires(snap, cfg) {
        verdicts.push(verdict(
            snap,
            FailureKind::FanFailure,
            Severity::High,
            0.0,
            0.0,
            "Rotational speed is 0 RPM while the machine is active".to_string(),
        ));
    }

    if let (true, Some(torque)) = (motor_strain_fires(snap, cfg), snap.torque_nm) {
        let severity = if torque > cfg.max_torque_nm * cfg.critical_torque_factor {
            Severity::Critical
        } else {
            Severity::High
        };
        verdicts.push(verdict(
            snap,
            FailureKind::MotorStrain,
            severity,
            torque,
            cfg.max_torque_nm,
            format!("Torque {torque:.1} Nm exceeds the {:.1} Nm limit", cfg.max_torque_nm),
        ));
    }

    if let (true, Some(wear)) = (tool_wear_fires(snap, cfg), snap.tool_wear_min) {
        verdicts.push(verdict(
            snap,
            FailureKind::ToolWear,
            Severity::Medium,
            wear,
            cfg.tool_wear_limit_min,
            format!(
                "Tool wear {wear:.0} min exceeds the {:.0} min limit",
                cfg.tool_wear_limit_min
            ),
        ));
    }

    verdicts.sort_by_key(|v| v.kind);
    verdicts
}

fn verdict(
    snap: &TelemetrySnapshot,
    kind: FailureKind,
    severity: Severity,
    observed: f64,
    limit: f64,
    description: String,
) -> FailureVerdict {
    FailureVerdict {
        kind,
        machine_id: snap.machine_id,
        timestamp: snap.timestamp,
        severity,
        observed,
        limit,
        description,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
