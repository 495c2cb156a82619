//! [`TelemetryReader`] / [`TelemetryWriter`] over Postgres.

use async_trait::async_trait;
use plantwatch_core::error::CoreError;
use plantwatch_core::ports::{TelemetryReader, TelemetryWriter};
use plantwatch_core::telemetry::{Machine, TelemetrySnapshot};
use plantwatch_core::types::MachineId;

use crate::models::sensor_log::CreateSensorLog;
use crate::repositories::{MachineRepo, SensorLogRepo};
use crate::DbPool;

const COLLABORATOR: &str = "telemetry store";

/// Telemetry store backed by the `machines` and `sensor_logs` tables.
#[derive(Debug, Clone)]
pub struct PgTelemetryStore {
    pool: DbPool,
}

impl PgTelemetryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Constraint violations are the store refusing this row; anything else is
/// the store being unreachable or broken.
fn map_write_error(err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::Database(db)
            if db.is_foreign_key_violation() || db.is_check_violation() || db.is_unique_violation() =>
        {
            tracing::debug!(constraint = ?db.constraint(), "Sensor log rejected by store");
            CoreError::Rejected(db.message().to_string())
        }
        _ => CoreError::unavailable(COLLABORATOR, err),
    }
}

fn map_read_error(err: sqlx::Error) -> CoreError {
    CoreError::unavailable(COLLABORATOR, err)
}

#[async_trait]
impl TelemetryReader for PgTelemetryStore {
    async fn machine(&self, id: MachineId) -> Result<Machine, CoreError> {
        MachineRepo::find_by_id(&self.pool, id)
            .await
            .map_err(map_read_error)?
            .map(Machine::from)
            .ok_or(CoreError::machine_not_found(id))
    }

    async fn latest(&self, id: MachineId) -> Result<Option<TelemetrySnapshot>, CoreError> {
        let latest = SensorLogRepo::latest_for_machine(&self.pool, id)
            .await
            .map_err(map_read_error)?;
        match latest {
            Some(row) => Ok(Some(row.into())),
            None => {
                // Distinguish "no telemetry yet" from "no such machine".
                if MachineRepo::exists(&self.pool, id).await.map_err(map_read_error)? {
                    Ok(None)
                } else {
                    Err(CoreError::machine_not_found(id))
                }
            }
        }
    }

    async fn recent(&self, id: MachineId, limit: usize) -> Result<Vec<TelemetrySnapshot>, CoreError> {
        if !MachineRepo::exists(&self.pool, id).await.map_err(map_read_error)? {
            return Err(CoreError::machine_not_found(id));
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = SensorLogRepo::recent_for_machine(&self.pool, id, limit)
            .await
            .map_err(map_read_error)?;
        rows.reverse();
        Ok(rows.into_iter().map(TelemetrySnapshot::from).collect())
    }

    async fn machine_ids(&self) -> Result<Vec<MachineId>, CoreError> {
        MachineRepo::list_ids(&self.pool).await.map_err(map_read_error)
    }
}

#[async_trait]
impl TelemetryWriter for PgTelemetryStore {
    async fn append(&self, snapshot: &TelemetrySnapshot) -> Result<(), CoreError> {
        SensorLogRepo::insert(&self.pool, &CreateSensorLog::from(snapshot))
            .await
            .map_err(map_write_error)?;
        Ok(())
    }
}
