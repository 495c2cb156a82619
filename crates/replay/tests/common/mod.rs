use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use tokio::time::Instant;

use plantwatch_core::error::CoreError;
use plantwatch_core::ports::TelemetryWriter;
use plantwatch_core::telemetry::TelemetrySnapshot;
use plantwatch_core::types::MachineId;
use plantwatch_replay::{ReplayRow, ReplayTable};

/// Sink that records every accepted append with the (paused) tokio instant.
#[derive(Default)]
pub struct RecordingSink {
    pub accepted: Mutex<Vec<(Instant, TelemetrySnapshot)>>,
    pub attempts: Mutex<Vec<MachineId>>,
    /// Appends for this machine are rejected.
    pub reject_machine: Option<MachineId>,
    /// Simulated write latency.
    pub latency: Duration,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting(machine_id: MachineId) -> Arc<Self> {
        Arc::new(Self {
            reject_machine: Some(machine_id),
            ..Default::default()
        })
    }

    pub fn slow(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Default::default()
        })
    }

    pub fn accepted_source_ids(&self) -> Vec<f64> {
        self.accepted
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, s)| s.tool_wear_min)
            .collect()
    }

    pub fn emission_offsets(&self, started: Instant) -> Vec<Duration> {
        self.accepted
            .lock()
            .unwrap()
            .iter()
            .map(|(at, _)| at.duration_since(started))
            .collect()
    }
}

#[async_trait]
impl TelemetryWriter for RecordingSink {
    async fn append(&self, snapshot: &TelemetrySnapshot) -> Result<(), CoreError> {
        let at = Instant::now();
        self.attempts.lock().unwrap().push(snapshot.machine_id);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.reject_machine == Some(snapshot.machine_id) {
            return Err(CoreError::Rejected(format!(
                "machine {} is not registered",
                snapshot.machine_id
            )));
        }
        self.accepted.lock().unwrap().push((at, snapshot.clone()));
        Ok(())
    }
}

/// Rows at the given minute offsets, machines alternating 1, 2, ...
/// `tool_wear_min` carries the row index so tests can identify rows.
pub fn table(minutes: &[i64]) -> Arc<ReplayTable> {
    let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 6, 0, 0).unwrap();
    let rows = minutes
        .iter()
        .enumerate()
        .map(|(i, m)| ReplayRow {
            source_id: Some(i as u64),
            snapshot: TelemetrySnapshot {
                machine_id: (i % 2) as MachineId + 1,
                timestamp: t0 + ChronoDuration::minutes(*m),
                air_temp_k: Some(298.0),
                process_temp_k: Some(470.0),
                rpm: Some(1500.0),
                torque_nm: Some(42.0),
                tool_wear_min: Some(i as f64),
                target: false,
                failure_type: None,
            },
        })
        .collect();
    Arc::new(ReplayTable::new(rows))
}
