#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use plantwatch_core::error::CoreError;
use plantwatch_core::ports::{KnowledgeRetriever, RetrievedPassage, TelemetryReader, TextGenerator};
use plantwatch_core::telemetry::{Machine, TelemetrySnapshot};
use plantwatch_core::types::MachineId;

pub const FAN_PROCEDURE: &str =
    "FF-001: Power down, let the hotend cool below 50 C, unplug the 24V fan connector and replace the extruder fan (M3 hex, 2.5 mm).";

// ---------------------------------------------------------------------------
// Telemetry store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    machines: Mutex<HashMap<MachineId, Machine>>,
    snapshots: Mutex<HashMap<MachineId, Vec<TelemetrySnapshot>>>,
    pub outage: AtomicBool,
    pub machine_calls: AtomicUsize,
    pub latest_calls: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_machine(&self, id: MachineId) {
        self.machines.lock().unwrap().insert(
            id,
            Machine {
                id,
                model_name: format!("Prusa MK4 #{id}"),
                location: Some("Bay A".into()),
                install_date: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            },
        );
    }

    pub fn push(&self, snapshot: TelemetrySnapshot) {
        self.snapshots
            .lock()
            .unwrap()
            .entry(snapshot.machine_id)
            .or_default()
            .push(snapshot);
    }

    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }

    pub fn machine_calls(&self) -> usize {
        self.machine_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CoreError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(CoreError::unavailable("telemetry store", "connection refused"));
        }
        Ok(())
    }

    fn known(&self, id: MachineId) -> Result<(), CoreError> {
        if self.machines.lock().unwrap().contains_key(&id) {
            Ok(())
        } else {
            Err(CoreError::machine_not_found(id))
        }
    }
}

#[async_trait]
impl TelemetryReader for FakeStore {
    async fn machine(&self, id: MachineId) -> Result<Machine, CoreError> {
        self.machine_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.machines
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(CoreError::machine_not_found(id))
    }

    async fn latest(&self, id: MachineId) -> Result<Option<TelemetrySnapshot>, CoreError> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.known(id)?;
        Ok(self
            .snapshots
            .lock()
            .unwrap()
            .get(&id)
            .and_then(|rows| rows.last().cloned()))
    }

    async fn recent(&self, id: MachineId, limit: usize) -> Result<Vec<TelemetrySnapshot>, CoreError> {
        self.check()?;
        self.known(id)?;
        let rows = self.snapshots.lock().unwrap().get(&id).cloned().unwrap_or_default();
        let skip = rows.len().saturating_sub(limit);
        Ok(rows.into_iter().skip(skip).collect())
    }

    async fn machine_ids(&self) -> Result<Vec<MachineId>, CoreError> {
        self.check()?;
        let mut ids: Vec<_> = self.machines.lock().unwrap().keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Retriever
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeRetriever {
    pub passages: Vec<RetrievedPassage>,
    pub fail: bool,
    pub queries: Mutex<Vec<String>>,
}

impl FakeRetriever {
    pub fn with_procedure(text: &str) -> Arc<Self> {
        Arc::new(Self {
            passages: vec![
                RetrievedPassage {
                    text: text.to_string(),
                    score: 0.82,
                    page: Some(14),
                },
                RetrievedPassage {
                    text: "Check belt tension on both axes.".into(),
                    score: 0.41,
                    page: Some(3),
                },
            ],
            ..Default::default()
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeRetriever for FakeRetriever {
    async fn search(&self, query: &str) -> Result<Vec<RetrievedPassage>, CoreError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(CoreError::unavailable("knowledge retriever", "HTTP 503"));
        }
        Ok(self.passages.clone())
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub struct FakeGenerator {
    reply: Result<String, CoreError>,
    delay: Duration,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn answering(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: Err(CoreError::unavailable("text generator", "HTTP 429")),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn hanging(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok("too late".into()),
            delay,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone()
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Printing, all readings nominal.
pub fn healthy(machine_id: MachineId) -> TelemetrySnapshot {
    TelemetrySnapshot {
        machine_id,
        timestamp: Utc::now(),
        air_temp_k: Some(298.1),
        process_temp_k: Some(483.0),
        rpm: Some(1500.0),
        torque_nm: Some(42.0),
        tool_wear_min: Some(35.0),
        target: false,
        failure_type: None,
    }
}

/// Hot and active but the fan is stopped.
pub fn fan_stopped(machine_id: MachineId) -> TelemetrySnapshot {
    TelemetrySnapshot {
        rpm: Some(0.0),
        target: true,
        failure_type: Some("Heat Dissipation Failure (HDF)".into()),
        ..healthy(machine_id)
    }
}
