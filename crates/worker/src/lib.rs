//! Replay host: configuration and failure injection for the
//! `plantwatch-worker` binary.

pub mod config;
pub mod inject;
