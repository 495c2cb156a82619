//! Repository for the `machines` table.

use sqlx::PgPool;
use plantwatch_core::types::DbId;

use crate::models::machine::{CreateMachine, MachineRow};

const COLUMNS: &str = "id, model_name, location, install_date, created_at";

/// Provides query operations for the asset registry.
pub struct MachineRepo;

impl MachineRepo {
    /// Register a machine, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateMachine) -> Result<MachineRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO machines (model_name, location, install_date) \
             VALUES ($1, $2, COALESCE($3, NOW())) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MachineRow>(&query)
            .bind(&input.model_name)
            .bind(&input.location)
            .bind(input.install_date)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<MachineRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM machines WHERE id = $1");
        sqlx::query_as::<_, MachineRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM machines WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    /// All machine ids, ascending.
    pub async fn list_ids(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as("SELECT id FROM machines ORDER BY id")
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
