use crate::types::DbId;

/// Domain error taxonomy shared by every plantwatch crate.
///
/// `NotFound` and `NoData` are distinct: a machine that exists but
/// has not reported telemetry yet is never reported as nominal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("No telemetry recorded for machine {machine_id}")]
    NoData { machine_id: DbId },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        reason: String,
    },

    #[error("Write rejected: {0}")]
    Rejected(String),
}

impl CoreError {
    /// Shorthand for an unknown machine.
    pub fn machine_not_found(id: DbId) -> Self {
        Self::NotFound {
            entity: "machine",
            id,
        }
    }

    /// Wrap a collaborator failure (network error, timeout, bad payload).
    pub fn unavailable(collaborator: &'static str, reason: impl ToString) -> Self {
        Self::CollaboratorUnavailable {
            collaborator,
            reason: reason.to_string(),
        }
    }

    /// Whether this error means the machine itself is unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
