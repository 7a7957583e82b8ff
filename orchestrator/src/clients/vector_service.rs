// Vector index backed by the external embedding and vector-db services

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::{check_status, with_timeout, IndexStore, SearchIndex};
use crate::error::ProviderError;
use crate::models::EvidenceChunk;

const EMBED_PROVIDER: &str = "embedding-service";
const VECTOR_PROVIDER: &str = "vector-db-service";
const EMBED_BATCH: usize = 50;

#[derive(Clone)]
pub struct VectorService {
    client: reqwest::Client,
    embedding_url: String,
    vector_url: String,
    embedding_model: String,
    index_path: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    index_id: &'a str,
    path: &'a str,
    vectors: &'a [Vec<f32>],
    metadata: &'a [EvidenceChunk],
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    index_id: &'a str,
    vector: &'a [f32],
    k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ScoredMetadata>,
}

#[derive(Deserialize)]
struct ScoredMetadata {
    metadata: Value,
    #[serde(default)]
    score: f32,
}

#[derive(Serialize)]
struct LoadRequest<'a> {
    path: &'a str,
}

#[derive(Deserialize)]
struct LoadResponse {
    index_id: String,
}

impl VectorService {
    pub fn new(
        embedding_url: &str,
        vector_url: &str,
        embedding_model: String,
        index_path: String,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            embedding_url: embedding_url.trim_end_matches('/').to_string(),
            vector_url: vector_url.trim_end_matches('/').to_string(),
            embedding_model,
            index_path,
            timeout,
        }
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH) {
            let request = EmbedRequest { model: &self.embedding_model, texts: batch };
            let response = self
                .client
                .post(format!("{}/embed", self.embedding_url))
                .json(&request)
                .send()
                .await?;
            let response = check_status(EMBED_PROVIDER, response).await?;
            let body: EmbedResponse = response.json().await?;
            if body.embeddings.len() != batch.len() {
                return Err(ProviderError::Malformed {
                    provider: EMBED_PROVIDER,
                    message: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        body.embeddings.len()
                    ),
                });
            }
            vectors.extend(body.embeddings);
        }
        Ok(vectors)
    }

    async fn post_vector<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}{}", self.vector_url, path))
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    fn snapshot(&self, index_id: String) -> Arc<dyn SearchIndex> {
        Arc::new(VectorServiceIndex { service: self.clone(), index_id })
    }
}

/// Parses vector-db metadata back into chunks, dropping entries that do not
/// describe a citable chunk.
fn chunks_from_metadata(results: Vec<ScoredMetadata>) -> Vec<EvidenceChunk> {
    results
        .into_iter()
        .filter_map(|hit| match serde_json::from_value::<EvidenceChunk>(hit.metadata) {
            Ok(chunk) => match chunk.validate() {
                Ok(()) => Some(chunk),
                Err(reason) => {
                    warn!(%reason, score = hit.score, "dropping invalid index hit");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, score = hit.score, "dropping index hit with unreadable metadata");
                None
            }
        })
        .collect()
}

/// One persisted snapshot inside the vector-db service.
pub struct VectorServiceIndex {
    service: VectorService,
    index_id: String,
}

#[async_trait]
impl SearchIndex for VectorServiceIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<EvidenceChunk>, ProviderError> {
        let service = &self.service;
        with_timeout(VECTOR_PROVIDER, service.timeout, async {
            let vector = service.embed(&[query]).await?.pop().ok_or(ProviderError::Malformed {
                provider: EMBED_PROVIDER,
                message: "no embedding returned for query".into(),
            })?;

            let request = SearchRequest { index_id: &self.index_id, vector: &vector, k };
            let response = service.post_vector("/index/search", &request).await?;
            let response = check_status(VECTOR_PROVIDER, response).await?;
            let body: SearchResponse = response.json().await?;

            let mut chunks = chunks_from_metadata(body.results);
            chunks.truncate(k);
            Ok::<_, ProviderError>(chunks)
        })
        .await
    }
}

#[async_trait]
impl IndexStore for VectorService {
    async fn create_index(
        &self,
        chunks: &[EvidenceChunk],
    ) -> Result<Arc<dyn SearchIndex>, ProviderError> {
        let index_id = Uuid::new_v4().to_string();
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();

        // Corpus builds are not bounded by the query timeout.
        let vectors = self.embed(&texts).await?;

        let request = CreateRequest {
            index_id: &index_id,
            path: &self.index_path,
            vectors: &vectors,
            metadata: chunks,
        };
        let response = self.post_vector("/index/create", &request).await?;
        check_status(VECTOR_PROVIDER, response).await?;

        info!(index_id = %index_id, chunks = chunks.len(), path = %self.index_path, "index snapshot created");
        Ok(self.snapshot(index_id))
    }

    async fn load_index(&self) -> Result<Option<Arc<dyn SearchIndex>>, ProviderError> {
        let request = LoadRequest { path: &self.index_path };
        let response = with_timeout(
            VECTOR_PROVIDER,
            self.timeout,
            self.post_vector("/index/load", &request),
        )
        .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            info!(path = %self.index_path, "no persisted index snapshot");
            return Ok(None);
        }
        let response = check_status(VECTOR_PROVIDER, response).await?;
        let body: LoadResponse = response.json().await?;

        info!(index_id = %body.index_id, path = %self.index_path, "index snapshot loaded");
        Ok(Some(self.snapshot(body.index_id)))
    }
}
