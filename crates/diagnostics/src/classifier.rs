//! Machine-level anomaly classification.

use std::sync::Arc;

use plantwatch_core::error::CoreError;
use plantwatch_core::ports::TelemetryReader;
use plantwatch_core::thresholds::{evaluate, ThresholdConfig};
use plantwatch_core::types::MachineId;
use plantwatch_core::verdict::Classification;

/// Runs the threshold rules over a machine's most recent snapshot.
#[derive(Clone)]
pub struct AnomalyClassifier {
    reader: Arc<dyn TelemetryReader>,
    thresholds: ThresholdConfig,
}

impl AnomalyClassifier {
    pub fn new(reader: Arc<dyn TelemetryReader>, thresholds: ThresholdConfig) -> Self {
        Self { reader, thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Classify the machine's current state.
    ///
    /// Reads the latest snapshot exactly once. A machine without telemetry
    /// yields [`Classification::NoData`]; an unknown machine is `NotFound`
    /// and a store failure is `CollaboratorUnavailable`, both propagated.
    pub async fn classify(&self, machine_id: MachineId) -> Result<Classification, CoreError> {
        let Some(snapshot) = self.reader.latest(machine_id).await? else {
            tracing::debug!(machine_id, "No telemetry to classify");
            return Ok(Classification::NoData { machine_id });
        };

        let verdicts = evaluate(&snapshot, &self.thresholds);
        if !verdicts.is_empty() {
            tracing::debug!(
                machine_id,
                count = verdicts.len(),
                primary = %verdicts[0].kind,
                "Threshold rules fired"
            );
        }
        Ok(Classification::Evaluated { snapshot, verdicts })
    }
}
