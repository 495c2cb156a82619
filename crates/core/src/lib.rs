//! Domain core of the plantwatch diagnostic engine.
//!
//! Everything in this crate is pure logic: the telemetry model, the
//! physics-based threshold rules, verdict and status types, the intent
//! router, the prompt template, and report rendering. The capability
//! traits the engine depends on live in [`ports`]; adapters implement them
//! in other crates.

pub mod config;
pub mod error;
pub mod intent;
pub mod ports;
pub mod prompt;
pub mod report;
pub mod telemetry;
pub mod thresholds;
pub mod types;
pub mod verdict;
