//! Time-shifted replay of a [`ReplayTable`] into a [`TelemetryWriter`].
//!
//! A [`ReplayScheduler`] owns its cursor; there is no process-wide replay
//! state. Each `start` spawns one task that walks the table in row order,
//! sleeping until `start_instant + offset[i]` before publishing row `i`.
//! Only one run is active at a time: `start` while running halts the old
//! run before the new one begins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use plantwatch_core::error::CoreError;
use plantwatch_core::ports::TelemetryWriter;
use plantwatch_core::telemetry::TelemetrySnapshot;
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::events::{ReplayEvent, ReplayStats, StopReason};
use crate::source::{ReplayRow, ReplayTable};
use crate::timing::{emission_offsets, validate_start};

/// Broadcast channel capacity for replay events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Emit a progress log line every this many published rows.
const PROGRESS_EVERY: usize = 10;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Observable scheduler state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReplayStatus {
    /// Never started.
    Idle,
    /// Waiting on or publishing `current_row`.
    Running { current_row: usize },
    /// The run ended; a restart must name its row explicitly.
    Stopped { next_row: usize, reason: StopReason },
}

impl ReplayStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Status tagged with the run that wrote it, so a halted run can never
/// overwrite its successor's status.
#[derive(Debug)]
struct StatusCell {
    run_id: u64,
    status: ReplayStatus,
}

/// How published snapshots are timestamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampMode {
    /// Stamp each snapshot with the wall-clock emission time.
    #[default]
    WallClock,
    /// Keep the source row's timestamp.
    Source,
}

impl std::str::FromStr for TimestampMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wall_clock" | "wallclock" | "now" => Ok(Self::WallClock),
            "source" => Ok(Self::Source),
            other => Err(CoreError::InvalidParameter(format!(
                "unknown timestamp mode {other:?} (expected wall_clock or source)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct ActiveRun {
    run_id: u64,
    cancel: CancellationToken,
    handle: JoinHandle<RunOutcome>,
}

enum RunOutcome {
    Finished,
    Cancelled { next_row: usize, stats: ReplayStats },
}

/// Replays a fixed table as a live-feeling telemetry stream.
pub struct ReplayScheduler {
    table: Arc<ReplayTable>,
    sink: Arc<dyn TelemetryWriter>,
    timestamp_mode: TimestampMode,
    status_tx: Arc<watch::Sender<StatusCell>>,
    event_tx: broadcast::Sender<ReplayEvent>,
    active: Mutex<Option<ActiveRun>>,
    next_run_id: AtomicU64,
}

impl ReplayScheduler {
    pub fn new(table: Arc<ReplayTable>, sink: Arc<dyn TelemetryWriter>) -> Self {
        let (status_tx, _) = watch::channel(StatusCell {
            run_id: 0,
            status: ReplayStatus::Idle,
        });
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            table,
            sink,
            timestamp_mode: TimestampMode::default(),
            status_tx: Arc::new(status_tx),
            event_tx,
            active: Mutex::new(None),
            next_run_id: AtomicU64::new(1),
        }
    }

    pub fn with_timestamp_mode(mut self, mode: TimestampMode) -> Self {
        self.timestamp_mode = mode;
        self
    }

    /// Subscribe to replay lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ReplayEvent> {
        self.event_tx.subscribe()
    }

    pub fn status(&self) -> ReplayStatus {
        self.status_tx.borrow().status.clone()
    }

    /// Begin replaying at `start_row`, with source gaps divided by `speed`.
    ///
    /// Parameters are validated before anything else happens. A run already
    /// in progress is halted first and reported as replaced.
    pub async fn start(&self, speed: f64, start_row: usize) -> Result<(), CoreError> {
        validate_start(speed, start_row, self.table.len())?;

        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            self.halt(previous, StopReason::Replaced).await;
        }

        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        self.status_tx.send_modify(|cell| {
            cell.run_id = run_id;
            cell.status = ReplayStatus::Running {
                current_row: start_row,
            };
        });
        let _ = self.event_tx.send(ReplayEvent::Started {
            run_id,
            start_row,
            total_rows: self.table.len(),
            speed,
        });
        tracing::info!(
            run_id,
            start_row,
            total_rows = self.table.len(),
            speed,
            "Replay started"
        );

        let cancel = CancellationToken::new();
        let run = ReplayRun {
            run_id,
            table: Arc::clone(&self.table),
            sink: Arc::clone(&self.sink),
            timestamp_mode: self.timestamp_mode,
            speed,
            start_row,
            cancel: cancel.clone(),
            status_tx: Arc::clone(&self.status_tx),
            event_tx: self.event_tx.clone(),
        };
        let handle = tokio::spawn(run.execute());

        *active = Some(ActiveRun {
            run_id,
            cancel,
            handle,
        });
        Ok(())
    }

    /// Cancel the current run, if any, and return the resulting status.
    ///
    /// Cancellation only interrupts the inter-row wait; a row already being
    /// published completes first.
    pub async fn stop(&self) -> ReplayStatus {
        let mut active = self.active.lock().await;
        if let Some(run) = active.take() {
            self.halt(run, StopReason::Cancelled).await;
        }
        self.status()
    }

    /// Wait until the current run ends, by finishing or being stopped.
    /// Returns immediately when nothing is running.
    pub async fn wait_until_stopped(&self) -> ReplayStatus {
        let mut rx = self.status_tx.subscribe();
        let status = match rx.wait_for(|cell| !cell.status.is_running()).await {
            Ok(cell) => cell.status.clone(),
            Err(_) => self.status(),
        };
        status
    }

    async fn halt(&self, run: ActiveRun, reason: StopReason) {
        run.cancel.cancel();
        match run.handle.await {
            Ok(RunOutcome::Finished) => {}
            Ok(RunOutcome::Cancelled { next_row, stats }) => {
                self.set_stopped(run.run_id, next_row, reason);
                let _ = self.event_tx.send(ReplayEvent::Stopped {
                    run_id: run.run_id,
                    next_row,
                    reason,
                    stats,
                });
                tracing::info!(
                    run_id = run.run_id,
                    next_row,
                    ?reason,
                    emitted = stats.emitted,
                    rejected = stats.rejected,
                    "Replay stopped"
                );
            }
            Err(e) => {
                let next_row = match self.status() {
                    ReplayStatus::Running { current_row } => current_row,
                    _ => 0,
                };
                self.set_stopped(run.run_id, next_row, reason);
                tracing::error!(run_id = run.run_id, error = %e, "Replay task failed");
            }
        }
    }

    fn set_stopped(&self, run_id: u64, next_row: usize, reason: StopReason) {
        set_status(
            &self.status_tx,
            run_id,
            ReplayStatus::Stopped { next_row, reason },
        );
    }
}

impl Drop for ReplayScheduler {
    fn drop(&mut self) {
        if let Some(run) = self.active.get_mut().take() {
            run.cancel.cancel();
        }
    }
}

fn set_status(tx: &watch::Sender<StatusCell>, run_id: u64, status: ReplayStatus) {
    tx.send_if_modified(|cell| {
        if cell.run_id != run_id || cell.status == status {
            return false;
        }
        cell.status = status;
        true
    });
}

// ---------------------------------------------------------------------------
// Run task
// ---------------------------------------------------------------------------

struct ReplayRun {
    run_id: u64,
    table: Arc<ReplayTable>,
    sink: Arc<dyn TelemetryWriter>,
    timestamp_mode: TimestampMode,
    speed: f64,
    start_row: usize,
    cancel: CancellationToken,
    status_tx: Arc<watch::Sender<StatusCell>>,
    event_tx: broadcast::Sender<ReplayEvent>,
}

impl ReplayRun {
    async fn execute(self) -> RunOutcome {
        let started = Instant::now();
        let offsets = emission_offsets(&self.table, self.start_row, self.speed);
        let mut stats = ReplayStats::default();

        for (step, offset) in offsets.into_iter().enumerate() {
            let row_idx = self.start_row + step;
            set_status(
                &self.status_tx,
                self.run_id,
                ReplayStatus::Running {
                    current_row: row_idx,
                },
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return RunOutcome::Cancelled { next_row: row_idx, stats };
                }
                _ = tokio::time::sleep_until(started + offset) => {}
            }

            let Some(row) = self.table.get(row_idx) else {
                break;
            };
            self.publish(row_idx, row, &mut stats).await;
        }

        let total = self.table.len();
        set_status(
            &self.status_tx,
            self.run_id,
            ReplayStatus::Stopped {
                next_row: total,
                reason: StopReason::Finished,
            },
        );
        let _ = self.event_tx.send(ReplayEvent::Finished {
            run_id: self.run_id,
            stats,
        });
        tracing::info!(
            run_id = self.run_id,
            emitted = stats.emitted,
            rejected = stats.rejected,
            "Replay finished"
        );
        RunOutcome::Finished
    }

    /// Publish one row. A failed append is logged and counted, never retried.
    async fn publish(&self, row_idx: usize, row: &ReplayRow, stats: &mut ReplayStats) {
        let snapshot = self.stamp(row);
        match self.sink.append(&snapshot).await {
            Ok(()) => {
                stats.emitted += 1;
                let _ = self.event_tx.send(ReplayEvent::RowEmitted {
                    run_id: self.run_id,
                    row: row_idx,
                    machine_id: snapshot.machine_id,
                    timestamp: snapshot.timestamp,
                });
                if stats.emitted % PROGRESS_EVERY == 0 {
                    tracing::info!(
                        run_id = self.run_id,
                        row = row_idx,
                        emitted = stats.emitted,
                        total = self.table.len(),
                        "Replay progress"
                    );
                }
            }
            Err(e) => {
                stats.rejected += 1;
                tracing::warn!(
                    run_id = self.run_id,
                    row = row_idx,
                    machine_id = snapshot.machine_id,
                    error = %e,
                    "Sink did not accept replay row; continuing"
                );
                let _ = self.event_tx.send(ReplayEvent::RowRejected {
                    run_id: self.run_id,
                    row: row_idx,
                    machine_id: snapshot.machine_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn stamp(&self, row: &ReplayRow) -> TelemetrySnapshot {
        let mut snapshot = row.snapshot.clone();
        if self.timestamp_mode == TimestampMode::WallClock {
            snapshot.timestamp = Utc::now();
        }
        snapshot
    }
}
