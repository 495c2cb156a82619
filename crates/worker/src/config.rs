use std::path::PathBuf;

use chrono::Duration as ChronoDuration;
use plantwatch_core::config::{env_opt, env_parse, env_parse_opt, env_string};
use plantwatch_core::error::CoreError;
use plantwatch_core::types::MachineId;
use plantwatch_replay::TimestampMode;

/// Machines rows are dealt to when neither the environment nor the store
/// names any.
pub const DEFAULT_FLEET_SIZE: MachineId = 10;

/// Replay worker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    pub csv_path: PathBuf,
    /// Source gaps are divided by this.
    pub speed: f64,
    pub start_row: usize,
    /// Load at most this many rows.
    pub row_limit: Option<usize>,
    /// Synthetic spacing between source rows.
    pub row_interval: ChronoDuration,
    /// Explicit machine ids; `None` means ask the store.
    pub machine_ids: Option<Vec<MachineId>>,
    pub timestamp_mode: TimestampMode,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/real_sensors.csv"),
            speed: 1.0,
            start_row: 0,
            row_limit: None,
            row_interval: ChronoDuration::minutes(5),
            machine_ids: None,
            timestamp_mode: TimestampMode::WallClock,
        }
    }
}

impl ReplayConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                   |
    /// |----------------------------|---------------------------|
    /// | `REPLAY_CSV_PATH`          | `data/real_sensors.csv`   |
    /// | `REPLAY_SPEED`             | `1.0`                     |
    /// | `REPLAY_START_ROW`         | `0`                       |
    /// | `REPLAY_ROW_LIMIT`         | unlimited                 |
    /// | `REPLAY_ROW_INTERVAL_SECS` | `300`                     |
    /// | `REPLAY_MACHINE_IDS`       | machines in the store     |
    /// | `REPLAY_TIMESTAMPS`        | `wall_clock`              |
    ///
    /// Speed and start row are validated again by the scheduler against the
    /// loaded table.
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();
        let row_interval = row_interval_from_secs(env_parse("REPLAY_ROW_INTERVAL_SECS", 300)?)?;

        let speed: f64 = env_parse("REPLAY_SPEED", defaults.speed)?;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(CoreError::InvalidParameter(format!(
                "REPLAY_SPEED must be a positive number, got {speed}"
            )));
        }

        Ok(Self {
            csv_path: PathBuf::from(env_string("REPLAY_CSV_PATH", "data/real_sensors.csv")),
            speed,
            start_row: env_parse("REPLAY_START_ROW", defaults.start_row)?,
            row_limit: env_parse_opt("REPLAY_ROW_LIMIT")?,
            row_interval,
            machine_ids: env_opt("REPLAY_MACHINE_IDS")
                .map(|raw| parse_machine_ids(&raw))
                .transpose()?,
            timestamp_mode: env_parse("REPLAY_TIMESTAMPS", defaults.timestamp_mode)?,
        })
    }
}

/// A positive number of seconds that fits a [`ChronoDuration`].
pub fn row_interval_from_secs(secs: i64) -> Result<ChronoDuration, CoreError> {
    ChronoDuration::try_seconds(secs)
        .filter(|d| *d > ChronoDuration::zero())
        .ok_or_else(|| {
            CoreError::InvalidParameter(format!(
                "REPLAY_ROW_INTERVAL_SECS must be a positive number of seconds, got {secs}"
            ))
        })
}

/// Parse `1,2,5-8` style id lists. Duplicates are dropped, order is kept.
pub fn parse_machine_ids(raw: &str) -> Result<Vec<MachineId>, CoreError> {
    let invalid = || CoreError::InvalidParameter(format!("REPLAY_MACHINE_IDS is invalid: {raw:?}"));

    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (lo, hi) = match part.split_once('-') {
            Some((lo, hi)) => (lo.trim(), hi.trim()),
            None => (part, part),
        };
        let lo: MachineId = lo.parse().map_err(|_| invalid())?;
        let hi: MachineId = hi.parse().map_err(|_| invalid())?;
        if lo <= 0 || hi < lo {
            return Err(invalid());
        }
        for id in lo..=hi {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    if ids.is_empty() {
        return Err(invalid());
    }
    Ok(ids)
}

/// `1..=DEFAULT_FLEET_SIZE`.
pub fn default_machine_ids() -> Vec<MachineId> {
    (1..=DEFAULT_FLEET_SIZE).collect()
}
