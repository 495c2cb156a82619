//! Replay lifecycle events, broadcast to any number of observers.

use plantwatch_core::types::{MachineId, Timestamp};
use serde::Serialize;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The last row was emitted.
    Finished,
    /// `stop()` was called.
    Cancelled,
    /// A new `start()` replaced this run.
    Replaced,
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub emitted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    Started {
        run_id: u64,
        start_row: usize,
        total_rows: usize,
        speed: f64,
    },
    RowEmitted {
        run_id: u64,
        row: usize,
        machine_id: MachineId,
        timestamp: Timestamp,
    },
    /// The sink refused or failed the row; the stream moved on without it.
    RowRejected {
        run_id: u64,
        row: usize,
        machine_id: MachineId,
        reason: String,
    },
    Finished {
        run_id: u64,
        stats: ReplayStats,
    },
    Stopped {
        run_id: u64,
        next_row: usize,
        reason: StopReason,
        stats: ReplayStats,
    },
}
