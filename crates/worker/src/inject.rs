//! Synthetic failure injection for demoing the diagnostic path.

use plantwatch_core::error::CoreError;
use plantwatch_core::ports::TelemetryWriter;
use plantwatch_core::telemetry::TelemetrySnapshot;
use plantwatch_core::thresholds::{evaluate, ThresholdConfig};
use plantwatch_core::types::{MachineId, Timestamp};
use plantwatch_core::verdict::FailureKind;

/// Margin pushed past a threshold so float rounding never hides the fault.
const MARGIN: f64 = 15.0;

/// Build a snapshot whose readings trip `kind` and stay nominal otherwise.
///
/// `cfg` is validated first. The result is checked against the rules before
/// it is returned, so an injected verdict always has a snapshot that really
/// satisfies it.
pub fn synthetic_snapshot(
    machine_id: MachineId,
    kind: FailureKind,
    cfg: &ThresholdConfig,
    at: Timestamp,
) -> Result<TelemetrySnapshot, CoreError> {
    cfg.validate()?;
    let heated = cfg.thermal_floor_k.max(cfg.active_process_temp_min_k) + MARGIN;
    let mut snapshot = TelemetrySnapshot {
        machine_id,
        timestamp: at,
        air_temp_k: Some(298.15),
        process_temp_k: Some(heated),
        rpm: Some(1500.0),
        torque_nm: Some(cfg.max_torque_nm * 0.7),
        tool_wear_min: Some(cfg.tool_wear_limit_min * 0.15),
        target: true,
        failure_type: Some(format!("Injected {}", kind.label())),
    };

    match kind {
        FailureKind::Thermal => {
            snapshot.process_temp_k =
                Some((cfg.active_process_temp_min_k + cfg.thermal_floor_k) / 2.0);
        }
        FailureKind::FanFailure => snapshot.rpm = Some(0.0),
        FailureKind::MotorStrain => snapshot.torque_nm = Some(cfg.max_torque_nm * 1.2),
        FailureKind::ToolWear => {
            snapshot.tool_wear_min = Some(cfg.tool_wear_limit_min + MARGIN);
        }
    }

    if !evaluate(&snapshot, cfg).iter().any(|v| v.kind == kind) {
        return Err(CoreError::InvalidParameter(format!(
            "could not construct a snapshot that trips {kind}"
        )));
    }
    Ok(snapshot)
}

/// Append one synthetic failing snapshot for `machine_id`.
pub async fn inject_failure(
    writer: &dyn TelemetryWriter,
    machine_id: MachineId,
    kind: FailureKind,
    cfg: &ThresholdConfig,
    at: Timestamp,
) -> Result<TelemetrySnapshot, CoreError> {
    let snapshot = synthetic_snapshot(machine_id, kind, cfg, at)?;
    writer.append(&snapshot).await?;
    tracing::info!(machine_id, kind = %kind, code = kind.code(), "Injected synthetic failure");
    Ok(snapshot)
}
