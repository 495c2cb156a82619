//! Asset registry models.

use plantwatch_core::telemetry::Machine;
use plantwatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `machines` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MachineRow {
    pub id: DbId,
    pub model_name: String,
    pub location: Option<String>,
    pub install_date: Timestamp,
    pub created_at: Timestamp,
}

/// DTO for registering a machine.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMachine {
    pub model_name: String,
    pub location: Option<String>,
    /// Defaults to now when absent.
    pub install_date: Option<Timestamp>,
}

impl From<MachineRow> for Machine {
    fn from(row: MachineRow) -> Self {
        Machine {
            id: row.id,
            model_name: row.model_name,
            location: row.location,
            install_date: row.install_date,
        }
    }
}
