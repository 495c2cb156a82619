//! Capability traits for the engine's external collaborators.
//!
//! Each trait is object-safe so hosts can hold `Arc<dyn Trait>` and tests can
//! substitute in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::telemetry::{Machine, TelemetrySnapshot};
use crate::types::MachineId;

/// Read side of the telemetry store.
#[async_trait]
pub trait TelemetryReader: Send + Sync {
    /// Registry entry for a machine; `NotFound` if unknown.
    async fn machine(&self, id: MachineId) -> Result<Machine, CoreError>;

    /// Most recent snapshot. `Ok(None)` when the machine exists but has no
    /// telemetry; `NotFound` when the machine is unknown.
    async fn latest(&self, id: MachineId) -> Result<Option<TelemetrySnapshot>, CoreError>;

    /// Up to `limit` most recent snapshots, oldest first.
    async fn recent(&self, id: MachineId, limit: usize) -> Result<Vec<TelemetrySnapshot>, CoreError>;

    /// Every registered machine id, ascending.
    async fn machine_ids(&self) -> Result<Vec<MachineId>, CoreError>;
}

/// Write side of the telemetry store.
#[async_trait]
pub trait TelemetryWriter: Send + Sync {
    /// Persist one snapshot. Fails with `Rejected` or `CollaboratorUnavailable`.
    async fn append(&self, snapshot: &TelemetrySnapshot) -> Result<(), CoreError>;
}

/// One ranked passage from the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub text: String,
    /// Relevance, higher is better.
    pub score: f64,
    pub page: Option<u32>,
}

/// Similarity search over repair manuals.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    /// Ranked passages, best first. May be empty.
    async fn search(&self, query: &str) -> Result<Vec<RetrievedPassage>, CoreError>;
}

/// Text completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CoreError>;
}
