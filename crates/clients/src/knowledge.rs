//! Knowledge-base client for a Chroma-style vector store.
//!
//! The collection is addressed by name in configuration; its server-side id
//! is resolved on first use (`GET /api/v1/collections/{name}`) and cached.
//! The query text is embedded through an OpenAI-compatible `/embeddings`
//! endpoint (the same model the manuals were ingested with), normalized, and
//! sent as `query_embeddings` to `POST /api/v1/collections/{id}/query`.

use async_trait::async_trait;
use plantwatch_core::error::CoreError;
use plantwatch_core::ports::{KnowledgeRetriever, RetrievedPassage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::config::RetrievalConfig;
use crate::error::{ensure_success, ClientError};

const COLLABORATOR: &str = "knowledge retriever";

/// Collection descriptor returned by the store.
#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

/// OpenAI-compatible embeddings response.
#[derive(Debug, Deserialize)]
pub struct EmbeddingResponse {
    #[serde(default)]
    pub data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
}

/// Raw query response. Every field is nested one level per query text; we
/// only ever send one.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<Option<f64>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
}

/// HTTP client for manual retrieval.
pub struct RetrievalClient {
    client: reqwest::Client,
    config: RetrievalConfig,
    collection_id: OnceCell<String>,
}

impl RetrievalClient {
    pub fn new(config: RetrievalConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            collection_id: OnceCell::new(),
        })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    async fn collection_id(&self) -> Result<&str, ClientError> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .get(format!(
                        "{}/api/v1/collections/{}",
                        self.base_url(),
                        self.config.collection
                    ))
                    .send()
                    .await?;
                let info: CollectionInfo = ensure_success(response).await?.json().await?;
                tracing::debug!(collection = %self.config.collection, id = %info.id, "Resolved collection");
                Ok::<_, ClientError>(info.id)
            })
            .await?;
        Ok(id.as_str())
    }

    /// Embed `text` with the configured embedding model.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ClientError> {
        let mut request = self
            .client
            .post(format!(
                "{}/embeddings",
                self.config.embedding_url.trim_end_matches('/')
            ))
            .json(&EmbeddingRequest {
                model: &self.config.embedding_model,
                input: [text],
            });
        if let Some(key) = &self.config.embedding_api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        let parsed: EmbeddingResponse = ensure_success(response).await?.json().await?;
        extract_embedding(parsed)
    }

    /// Query the collection and return ranked, filtered passages.
    pub async fn query(&self, query: &str) -> Result<Vec<RetrievedPassage>, ClientError> {
        let collection_id = self.collection_id().await?;
        let embedding = self.embed(query).await?;
        let body = serde_json::json!({
            "query_embeddings": [embedding],
            "n_results": self.config.top_k,
            "include": ["documents", "distances", "metadatas"],
        });

        let response = self
            .client
            .post(format!(
                "{}/api/v1/collections/{collection_id}/query",
                self.base_url()
            ))
            .json(&body)
            .send()
            .await?;
        let parsed: QueryResponse = ensure_success(response).await?.json().await?;

        Ok(rank_passages(parsed, self.config.min_score, self.config.top_k))
    }
}

#[async_trait]
impl KnowledgeRetriever for RetrievalClient {
    async fn search(&self, query: &str) -> Result<Vec<RetrievedPassage>, CoreError> {
        self.query(query)
            .await
            .map_err(|e| CoreError::unavailable(COLLABORATOR, e))
    }
}

// ---------------------------------------------------------------------------
// Response shaping
// ---------------------------------------------------------------------------

/// First embedding, L2-normalized. Empty or all-zero vectors are malformed.
pub fn extract_embedding(response: EmbeddingResponse) -> Result<Vec<f32>, ClientError> {
    let mut vector = response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .unwrap_or_default();
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if vector.is_empty() || !norm.is_normal() {
        return Err(ClientError::MalformedResponse(
            "embedding response contained no usable vector".into(),
        ));
    }
    vector.iter_mut().for_each(|v| *v /= norm);
    Ok(vector)
}

/// Similarity in `(0, 1]` for a non-negative distance.
pub fn similarity(distance: f64) -> f64 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Turn a raw response into passages scored by [`similarity`], drop blanks
/// and anything under `min_score`, best first, at most `top_k`.
pub fn rank_passages(response: QueryResponse, min_score: f64, top_k: usize) -> Vec<RetrievedPassage> {
    let documents = first_row(response.documents);
    let distances = first_row(response.distances);
    let metadatas = first_row(response.metadatas);

    let mut passages: Vec<RetrievedPassage> = documents
        .into_iter()
        .enumerate()
        .filter_map(|(i, doc)| {
            let text = doc?.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let distance = distances.get(i).copied().flatten().unwrap_or(f64::INFINITY);
            let page = metadatas
                .get(i)
                .and_then(Option::as_ref)
                .and_then(|m| m.get("page"))
                .and_then(page_number);
            Some(RetrievedPassage {
                text,
                score: similarity(distance),
                page,
            })
        })
        .filter(|p| p.score >= min_score)
        .collect();

    passages.sort_by(|a, b| b.score.total_cmp(&a.score));
    passages.truncate(top_k);
    passages
}

fn first_row<T>(nested: Option<Vec<Vec<T>>>) -> Vec<T> {
    nested
        .and_then(|rows| rows.into_iter().next())
        .unwrap_or_default()
}

/// Page metadata is written as a number by some ingesters and a string by others.
fn page_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
