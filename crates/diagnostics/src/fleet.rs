//! Fleet-wide status scan.

use std::fmt::Write;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use plantwatch_core::error::CoreError;
use plantwatch_core::ports::TelemetryReader;
use plantwatch_core::types::{MachineId, Timestamp};
use plantwatch_core::verdict::{FailureKind, MachineStatus};
use serde::Serialize;

use crate::classifier::AnomalyClassifier;

/// Flagged machines listed in a summary before collapsing the rest.
pub const MAX_LISTED: usize = 10;

/// One machine's line in a fleet report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetEntry {
    pub machine_id: MachineId,
    pub status: MachineStatus,
    /// Highest-priority fired rule, if any.
    pub primary: Option<FailureKind>,
    /// Set when this machine could not be classified.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub scanned_at: Timestamp,
    /// Flagged machines first (most severe first), then by id.
    pub entries: Vec<FleetEntry>,
}

impl FleetReport {
    pub fn flagged(&self) -> impl Iterator<Item = &FleetEntry> {
        self.entries.iter().filter(|e| e.status.is_flagged())
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged().count()
    }

    /// Plain-text summary listing at most [`MAX_LISTED`] flagged machines.
    pub fn render_summary(&self) -> String {
        let flagged: Vec<&FleetEntry> = self.flagged().collect();
        let mut out = format!(
            "Fleet scan at {}: {} machines, {} flagged.\n",
            self.scanned_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.entries.len(),
            flagged.len()
        );
        if flagged.is_empty() {
            out.push_str("All machines operating within thresholds.\n");
            return out;
        }
        for entry in flagged.iter().take(MAX_LISTED) {
            let _ = write!(out, "- Machine {}: {}", entry.machine_id, entry.status.as_str());
            if let Some(kind) = entry.primary {
                let _ = write!(out, " - {} ({})", kind.label(), kind.code());
            } else if let Some(error) = &entry.error {
                let _ = write!(out, " - {error}");
            } else if entry.status == MachineStatus::Unknown {
                out.push_str(" - no telemetry");
            }
            out.push('\n');
        }
        if flagged.len() > MAX_LISTED {
            let _ = writeln!(out, "... and {} more", flagged.len() - MAX_LISTED);
        }
        out
    }
}

/// Lower sorts first.
fn attention_rank(status: MachineStatus) -> u8 {
    match status {
        MachineStatus::Critical => 0,
        MachineStatus::Warning => 1,
        MachineStatus::Caution => 2,
        MachineStatus::Unknown => 3,
        MachineStatus::Normal => 4,
    }
}

/// Classifies every registered machine concurrently.
pub struct FleetScanner {
    reader: Arc<dyn TelemetryReader>,
    classifier: AnomalyClassifier,
}

impl FleetScanner {
    pub fn new(reader: Arc<dyn TelemetryReader>, classifier: AnomalyClassifier) -> Self {
        Self { reader, classifier }
    }

    /// Listing the fleet must succeed; a single machine failing to classify
    /// is reported as `Unknown` with its error.
    pub async fn scan(&self) -> Result<FleetReport, CoreError> {
        let ids = self.reader.machine_ids().await?;
        let results = join_all(ids.iter().map(|&id| self.classifier.classify(id))).await;

        let mut entries: Vec<FleetEntry> = ids
            .into_iter()
            .zip(results)
            .map(|(machine_id, result)| match result {
                Ok(classification) => FleetEntry {
                    machine_id,
                    status: classification.status(),
                    primary: classification.primary().map(|v| v.kind),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(machine_id, error = %e, "Could not classify machine");
                    FleetEntry {
                        machine_id,
                        status: MachineStatus::Unknown,
                        primary: None,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect();
        entries.sort_by_key(|e| (attention_rank(e.status), e.machine_id));

        let report = FleetReport {
            scanned_at: Utc::now(),
            entries,
        };
        tracing::info!(
            machines = report.entries.len(),
            flagged = report.flagged_count(),
            "Fleet scan complete"
        );
        Ok(report)
    }
}
