//! Replay source: a finite, ordered, read-only table of telemetry rows.

use std::io::BufRead;
use std::path::Path;

use chrono::Duration as ChronoDuration;
use plantwatch_core::telemetry::{FailureFlags, TelemetrySnapshot};
use plantwatch_core::types::{MachineId, Timestamp};

/// Minimum number of columns in an AI4I row.
const AI4I_COLUMNS: usize = 14;

/// Errors loading a replay source.
#[derive(Debug, thiserror::Error)]
pub enum ReplaySourceError {
    #[error("Failed to read replay source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Replay source contains no usable rows ({skipped} skipped)")]
    Empty { skipped: usize },

    #[error("No machine ids to assign rows to")]
    NoMachines,

    #[error("Row interval must be positive")]
    InvalidInterval,

    #[error("Row {row} timestamp is out of range for the configured interval")]
    TimestampOverflow { row: usize },
}

/// One source row, addressable by its index in the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayRow {
    /// Identifier from the source file (AI4I `UDI`), if any.
    pub source_id: Option<u64>,
    /// The snapshot this row publishes. Its timestamp is the source timestamp
    /// used for inter-row delays.
    pub snapshot: TelemetrySnapshot,
}

impl ReplayRow {
    pub fn timestamp(&self) -> Timestamp {
        self.snapshot.timestamp
    }

    pub fn machine_id(&self) -> MachineId {
        self.snapshot.machine_id
    }
}

/// Rows in source order. Row `k` is the `k`-th source row; timestamps are
/// not required to be monotonic.
#[derive(Debug, Clone, Default)]
pub struct ReplayTable {
    rows: Vec<ReplayRow>,
}

impl ReplayTable {
    pub fn new(rows: Vec<ReplayRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ReplayRow> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[ReplayRow] {
        &self.rows
    }

    /// Load an AI4I 2020 predictive-maintenance CSV file.
    pub fn from_ai4i_csv(
        path: impl AsRef<Path>,
        options: &Ai4iOptions,
    ) -> Result<(Self, LoadReport), ReplaySourceError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_ai4i_reader(std::io::BufReader::new(file), options)
    }

    /// Parse AI4I rows from any buffered reader.
    ///
    /// Row `i` (counting only accepted rows) is stamped `base + i * interval`
    /// and assigned to `machine_ids[i % machine_ids.len()]`. Malformed rows
    /// are skipped and counted.
    pub fn from_ai4i_reader(
        reader: impl BufRead,
        options: &Ai4iOptions,
    ) -> Result<(Self, LoadReport), ReplaySourceError> {
        if options.machine_ids.is_empty() {
            return Err(ReplaySourceError::NoMachines);
        }
        if options.interval <= ChronoDuration::zero() {
            return Err(ReplaySourceError::InvalidInterval);
        }

        let mut rows = Vec::new();
        let mut report = LoadReport::default();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_start_matches('\u{feff}').trim();
            if line.is_empty() {
                continue;
            }
            if line_no == 0 && is_header(line) {
                continue;
            }
            if options.limit.is_some_and(|limit| rows.len() >= limit) {
                break;
            }

            let i = rows.len();
            let machine_id = options.machine_ids[i % options.machine_ids.len()];
            let timestamp =
                row_timestamp(options, i).ok_or(ReplaySourceError::TimestampOverflow { row: i })?;

            match parse_ai4i_line(line, machine_id, timestamp) {
                Some(row) => rows.push(row),
                None => {
                    report.skipped += 1;
                    tracing::warn!(line = line_no + 1, "Skipping malformed replay row");
                }
            }
        }

        report.loaded = rows.len();
        if rows.is_empty() {
            return Err(ReplaySourceError::Empty {
                skipped: report.skipped,
            });
        }
        Ok((Self::new(rows), report))
    }
}

/// `base + i * interval`, or `None` on overflow.
fn row_timestamp(options: &Ai4iOptions, i: usize) -> Option<Timestamp> {
    let steps = i32::try_from(i).ok()?;
    let offset = options.interval.checked_mul(steps)?;
    options.base.checked_add_signed(offset)
}

/// Options for [`ReplayTable::from_ai4i_csv`].
#[derive(Debug, Clone)]
pub struct Ai4iOptions {
    /// Machines rows are dealt to, round-robin.
    pub machine_ids: Vec<MachineId>,
    /// Synthetic timestamp of the first row.
    pub base: Timestamp,
    /// Synthetic spacing between consecutive rows.
    pub interval: ChronoDuration,
    /// Stop after this many accepted rows.
    pub limit: Option<usize>,
}

impl Ai4iOptions {
    /// Rows 5 minutes apart, starting 30 days before `now`.
    pub fn new(machine_ids: Vec<MachineId>, now: Timestamp) -> Self {
        Self {
            machine_ids,
            base: now - ChronoDuration::days(30),
            interval: ChronoDuration::minutes(5),
            limit: None,
        }
    }
}

/// Outcome counts from loading a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

fn is_header(line: &str) -> bool {
    line.split(',')
        .next()
        .is_some_and(|first| unquote(first).parse::<f64>().is_err())
}

fn unquote(field: &str) -> &str {
    field.trim().trim_matches('"')
}

/// Columns: UDI, Product ID, Type, air K, process K, rpm, torque, wear,
/// machine failure, TWF, HDF, PWF, OSF, RNF.
fn parse_ai4i_line(line: &str, machine_id: MachineId, timestamp: Timestamp) -> Option<ReplayRow> {
    let fields: Vec<&str> = line.split(',').map(unquote).collect();
    if fields.len() < AI4I_COLUMNS {
        return None;
    }

    let number = |idx: usize| fields[idx].parse::<f64>().ok().filter(|v| v.is_finite());
    let flag = |idx: usize| match fields[idx] {
        "1" | "1.0" | "true" | "True" => Some(true),
        "0" | "0.0" | "false" | "False" => Some(false),
        _ => None,
    };

    let target = flag(8)?;
    let flags = FailureFlags {
        twf: flag(9)?,
        hdf: flag(10)?,
        pwf: flag(11)?,
        osf: flag(12)?,
        rnf: flag(13)?,
    };

    Some(ReplayRow {
        source_id: fields[0].parse().ok(),
        snapshot: TelemetrySnapshot {
            machine_id,
            timestamp,
            air_temp_k: Some(number(3)?),
            process_temp_k: Some(number(4)?),
            rpm: Some(number(5)?),
            torque_nm: Some(number(6)?),
            tool_wear_min: Some(number(7)?),
            target,
            failure_type: Some(flags.label(target).to_string()),
        },
    })
}
