//! Replay timing: parameter validation and emission offsets.
//!
//! Offsets are measured from the run's start instant, so the scheduler can
//! sleep until absolute deadlines and sink latency never accumulates.

use std::time::Duration;

use plantwatch_core::error::CoreError;

use crate::source::ReplayTable;

/// Upper bound for a single offset. Keeps `Instant + offset` from
/// overflowing on absurdly slow speeds.
pub const MAX_OFFSET: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 10);

/// Reject a start request before any side effect.
pub fn validate_start(speed: f64, start_row: usize, len: usize) -> Result<(), CoreError> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(CoreError::InvalidParameter(format!(
            "speed multiplier must be a positive number, got {speed}"
        )));
    }
    if start_row >= len {
        return Err(CoreError::InvalidParameter(format!(
            "start row {start_row} is out of range for a table of {len} rows"
        )));
    }
    Ok(())
}

/// Source gap between two rows; a backwards step counts as zero.
pub fn clamped_delta(table: &ReplayTable, from: usize, to: usize) -> Duration {
    match (table.get(from), table.get(to)) {
        (Some(a), Some(b)) => (b.timestamp() - a.timestamp()).to_std().unwrap_or(Duration::ZERO),
        _ => Duration::ZERO,
    }
}

/// `delta / speed`, saturating at [`MAX_OFFSET`].
pub fn scale(delta: Duration, speed: f64) -> Duration {
    Duration::try_from_secs_f64(delta.as_secs_f64() / speed)
        .unwrap_or(MAX_OFFSET)
        .min(MAX_OFFSET)
}

/// Offset from start for every row from `start_row` to the end. The first
/// entry is always zero.
pub fn emission_offsets(table: &ReplayTable, start_row: usize, speed: f64) -> Vec<Duration> {
    let mut offsets = Vec::with_capacity(table.len().saturating_sub(start_row));
    let mut source_elapsed = Duration::ZERO;
    for row in start_row..table.len() {
        if row > start_row {
            source_elapsed = source_elapsed.saturating_add(clamped_delta(table, row - 1, row));
        }
        offsets.push(scale(source_elapsed, speed));
    }
    offsets
}
