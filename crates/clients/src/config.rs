use std::time::Duration;

use plantwatch_core::config::{env_opt, env_parse, env_string};
use plantwatch_core::error::CoreError;

/// Knowledge-base client configuration.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Base URL of the vector store (default: `http://localhost:8001`).
    pub url: String,
    /// Collection holding the manual chunks (default: `technical_manuals`).
    pub collection: String,
    /// Passages requested per query (default: `3`).
    pub top_k: usize,
    /// Passages scoring below this are dropped (default: `0.0`, keep all).
    /// Scores are `1 / (1 + distance)`.
    pub min_score: f64,
    /// OpenAI-compatible base URL serving `/embeddings` (default:
    /// `http://localhost:8080/v1`).
    pub embedding_url: String,
    /// Must match the model the collection was ingested with.
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    /// Per-request timeout (default: 10 s).
    pub timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001".into(),
            collection: "technical_manuals".into(),
            top_k: 3,
            min_score: 0.0,
            embedding_url: "http://localhost:8080/v1".into(),
            embedding_model: "BAAI/bge-base-en-v1.5".into(),
            embedding_api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetrievalConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `RETRIEVAL_URL`          | `http://localhost:8001` |
    /// | `RETRIEVAL_COLLECTION`   | `technical_manuals`     |
    /// | `RETRIEVAL_TOP_K`        | `3`                     |
    /// | `RETRIEVAL_MIN_SCORE`    | `0.0`                   |
    /// | `EMBEDDING_URL`          | `http://localhost:8080/v1` |
    /// | `EMBEDDING_MODEL`        | `BAAI/bge-base-en-v1.5` |
    /// | `EMBEDDING_API_KEY`      | none                    |
    /// | `RETRIEVAL_TIMEOUT_SECS` | `10`                    |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();
        let config = Self {
            url: env_string("RETRIEVAL_URL", &defaults.url),
            collection: env_string("RETRIEVAL_COLLECTION", &defaults.collection),
            top_k: env_parse("RETRIEVAL_TOP_K", defaults.top_k)?,
            min_score: env_parse("RETRIEVAL_MIN_SCORE", defaults.min_score)?,
            embedding_url: env_string("EMBEDDING_URL", &defaults.embedding_url),
            embedding_model: env_string("EMBEDDING_MODEL", &defaults.embedding_model),
            embedding_api_key: env_opt("EMBEDDING_API_KEY"),
            timeout: Duration::from_secs(env_parse("RETRIEVAL_TIMEOUT_SECS", 10u64)?),
        };
        if config.top_k == 0 {
            return Err(CoreError::InvalidParameter(
                "RETRIEVAL_TOP_K must be at least 1".into(),
            ));
        }
        Ok(config)
    }
}

/// Chat-completion client configuration.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// OpenAI-compatible base URL (default: Groq).
    pub api_url: String,
    pub model: String,
    /// Bearer token. Absent means every completion fails fast.
    pub api_key: Option<String>,
    /// Per-request timeout (default: 30 s).
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.groq.com/openai/v1".into(),
            model: "llama-3.1-8b-instant".into(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl GenerationConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                          |
    /// |----------------------------------|----------------------------------|
    /// | `LLM_API_URL`                    | `https://api.groq.com/openai/v1` |
    /// | `LLM_MODEL`                      | `llama-3.1-8b-instant`           |
    /// | `LLM_API_KEY` / `GROQ_API_KEY`   | none                             |
    /// | `LLM_TIMEOUT_SECS`               | `30`                             |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();
        Ok(Self {
            api_url: env_string("LLM_API_URL", &defaults.api_url),
            model: env_string("LLM_MODEL", &defaults.model),
            api_key: env_opt("LLM_API_KEY").or_else(|| env_opt("GROQ_API_KEY")),
            timeout: Duration::from_secs(env_parse("LLM_TIMEOUT_SECS", 30u64)?),
        })
    }
}
