//! Time-shifted telemetry replay.
//!
//! Turns a static historical table ([`source::ReplayTable`]) into a
//! live-feeling stream: inter-row gaps are preserved, divided by a speed
//! factor, and each row is appended to a telemetry sink in source order.

pub mod events;
pub mod scheduler;
pub mod source;
pub mod timing;

pub use events::{ReplayEvent, ReplayStats, StopReason};
pub use scheduler::{ReplayScheduler, ReplayStatus, TimestampMode};
pub use source::{Ai4iOptions, LoadReport, ReplayRow, ReplaySourceError, ReplayTable};
