//! Diagnostic services: per-machine classification, the plan-driven
//! diagnostic orchestrator, and fleet-wide scans.
//!
//! Every service holds its collaborators as `Arc<dyn Port>` so the binary
//! wires in the Postgres store and HTTP clients while tests use fakes.

pub mod classifier;
pub mod fleet;
pub mod orchestrator;

pub use classifier::AnomalyClassifier;
pub use fleet::{FleetEntry, FleetReport, FleetScanner};
pub use orchestrator::{
    DiagnosisStatus, DiagnosticOrchestrator, DiagnosticResult, OrchestratorConfig,
    ProcedureOutcome, SensorState,
};
