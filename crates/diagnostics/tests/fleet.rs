mod common;

use assert_matches::assert_matches;

use common::{fan_stopped, healthy, FakeStore};
use plantwatch_core::error::CoreError;
use plantwatch_core::telemetry::TelemetrySnapshot;
use plantwatch_core::thresholds::ThresholdConfig;
use plantwatch_core::verdict::{FailureKind, MachineStatus};
use plantwatch_diagnostics::{AnomalyClassifier, FleetScanner};

fn scanner(store: &std::sync::Arc<FakeStore>) -> FleetScanner {
    FleetScanner::new(
        store.clone(),
        AnomalyClassifier::new(store.clone(), ThresholdConfig::default()),
    )
}

#[tokio::test]
async fn flagged_machines_sort_first() {
    let store = FakeStore::new();
    for id in 1..=4 {
        store.add_machine(id);
    }
    store.push(healthy(1));
    store.push(fan_stopped(2));
    // machine 3 has no telemetry
    store.push(TelemetrySnapshot {
        process_temp_k: Some(440.0),
        ..healthy(4)
    });

    let report = scanner(&store).scan().await.unwrap();
    let order: Vec<_> = report.entries.iter().map(|e| (e.machine_id, e.status)).collect();
    assert_eq!(
        order,
        vec![
            (4, MachineStatus::Critical),
            (2, MachineStatus::Warning),
            (3, MachineStatus::Unknown),
            (1, MachineStatus::Normal),
        ]
    );
    assert_eq!(report.entries[0].primary, Some(FailureKind::Thermal));
    assert_eq!(report.flagged_count(), 3);

    let summary = report.render_summary();
    assert!(summary.contains("4 machines, 3 flagged"));
    assert!(summary.contains("- Machine 2: WARNING - Fan Failure (FF-001)"));
    assert!(!summary.contains("Machine 1:"));
}

#[tokio::test]
async fn fleet_listing_failure_propagates() {
    let store = FakeStore::new();
    store.add_machine(1);
    store.set_outage(true);

    assert_matches!(
        scanner(&store).scan().await,
        Err(CoreError::CollaboratorUnavailable { .. })
    );
}
