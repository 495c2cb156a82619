//! Repository for the `sensor_logs` table (append-only time series).

use sqlx::PgPool;
use plantwatch_core::types::DbId;

use crate::models::sensor_log::{CreateSensorLog, SensorLog};

/// Column list for `sensor_logs` SELECT queries.
const COLUMNS: &str = "\
    id, machine_id, recorded_at, \
    air_temp_k, process_temp_k, rpm, torque_nm, tool_wear_min, \
    target, failure_type, created_at";

/// Column list for INSERT statements (excludes `id` and `created_at`).
const INSERT_COLUMNS: &str = "\
    machine_id, recorded_at, \
    air_temp_k, process_temp_k, rpm, torque_nm, tool_wear_min, \
    target, failure_type";

/// Provides query operations for sensor logs.
pub struct SensorLogRepo;

impl SensorLogRepo {
    /// Append one reading.
    pub async fn insert(pool: &PgPool, log: &CreateSensorLog) -> Result<SensorLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO sensor_logs ({INSERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SensorLog>(&query)
            .bind(log.machine_id)
            .bind(log.recorded_at)
            .bind(log.air_temp_k)
            .bind(log.process_temp_k)
            .bind(log.rpm)
            .bind(log.torque_nm)
            .bind(log.tool_wear_min)
            .bind(log.target)
            .bind(&log.failure_type)
            .fetch_one(pool)
            .await
    }

    /// Most recent reading for a machine. Ties on `recorded_at` resolve to the
    /// latest insert.
    pub async fn latest_for_machine(
        pool: &PgPool,
        machine_id: DbId,
    ) -> Result<Option<SensorLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sensor_logs \
             WHERE machine_id = $1 \
             ORDER BY recorded_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, SensorLog>(&query)
            .bind(machine_id)
            .fetch_optional(pool)
            .await
    }

    /// Up to `limit` most recent readings, newest first.
    pub async fn recent_for_machine(
        pool: &PgPool,
        machine_id: DbId,
        limit: i64,
    ) -> Result<Vec<SensorLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sensor_logs \
             WHERE machine_id = $1 \
             ORDER BY recorded_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, SensorLog>(&query)
            .bind(machine_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn count_for_machine(pool: &PgPool, machine_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sensor_logs WHERE machine_id = $1")
            .bind(machine_id)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}
