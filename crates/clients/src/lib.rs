//! HTTP adapters for the knowledge base and the answer generator.
//!
//! Both clients implement the capability traits from
//! [`plantwatch_core::ports`]; their own [`ClientError`] is folded into
//! `CoreError::CollaboratorUnavailable` at that boundary.

pub mod config;
pub mod error;
pub mod generation;
pub mod knowledge;

pub use config::{GenerationConfig, RetrievalConfig};
pub use error::ClientError;
pub use generation::ChatCompletionClient;
pub use knowledge::RetrievalClient;
