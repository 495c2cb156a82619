use std::sync::Mutex;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::Utc;

use plantwatch_core::error::CoreError;
use plantwatch_core::ports::TelemetryWriter;
use plantwatch_core::telemetry::TelemetrySnapshot;
use plantwatch_core::thresholds::{fan_failure_fires, ThresholdConfig};
use plantwatch_core::verdict::FailureKind;
use plantwatch_worker::inject::inject_failure;

#[derive(Default)]
struct RecordingWriter {
    rows: Mutex<Vec<TelemetrySnapshot>>,
    reject: bool,
}

#[async_trait]
impl TelemetryWriter for RecordingWriter {
    async fn append(&self, snapshot: &TelemetrySnapshot) -> Result<(), CoreError> {
        if self.reject {
            return Err(CoreError::Rejected("unknown machine".into()));
        }
        self.rows.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

#[tokio::test]
async fn injected_fan_failure_is_persisted() {
    let writer = RecordingWriter::default();
    let cfg = ThresholdConfig::default();

    let snapshot = inject_failure(&writer, 4, FailureKind::parse("fan").unwrap(), &cfg, Utc::now())
        .await
        .unwrap();

    let rows = writer.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], snapshot);
    assert_eq!(rows[0].machine_id, 4);
    assert!(fan_failure_fires(&rows[0], &cfg));
}

#[tokio::test]
async fn rejected_injection_surfaces_error() {
    let writer = RecordingWriter {
        reject: true,
        ..Default::default()
    };
    assert_matches!(
        inject_failure(&writer, 99, FailureKind::ToolWear, &ThresholdConfig::default(), Utc::now()).await,
        Err(CoreError::Rejected(_))
    );
}
