//! Sensor log models (append-only time series).

use plantwatch_core::telemetry::TelemetrySnapshot;
use plantwatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `sensor_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SensorLog {
    pub id: DbId,
    pub machine_id: DbId,
    pub recorded_at: Timestamp,
    pub air_temp_k: Option<f64>,
    pub process_temp_k: Option<f64>,
    pub rpm: Option<f64>,
    pub torque_nm: Option<f64>,
    pub tool_wear_min: Option<f64>,
    pub target: bool,
    pub failure_type: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for inserting a sensor log row.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSensorLog {
    pub machine_id: DbId,
    pub recorded_at: Timestamp,
    pub air_temp_k: Option<f64>,
    pub process_temp_k: Option<f64>,
    pub rpm: Option<f64>,
    pub torque_nm: Option<f64>,
    pub tool_wear_min: Option<f64>,
    pub target: bool,
    pub failure_type: Option<String>,
}

impl From<SensorLog> for TelemetrySnapshot {
    fn from(row: SensorLog) -> Self {
        TelemetrySnapshot {
            machine_id: row.machine_id,
            timestamp: row.recorded_at,
            air_temp_k: row.air_temp_k,
            process_temp_k: row.process_temp_k,
            rpm: row.rpm,
            torque_nm: row.torque_nm,
            tool_wear_min: row.tool_wear_min,
            target: row.target,
            failure_type: row.failure_type,
        }
    }
}

impl From<&TelemetrySnapshot> for CreateSensorLog {
    fn from(snap: &TelemetrySnapshot) -> Self {
        CreateSensorLog {
            machine_id: snap.machine_id,
            recorded_at: snap.timestamp,
            air_temp_k: snap.air_temp_k,
            process_temp_k: snap.process_temp_k,
            rpm: snap.rpm,
            torque_nm: snap.torque_nm,
            tool_wear_min: snap.tool_wear_min,
            target: snap.target,
            failure_type: snap.failure_type.clone(),
        }
    }
}
