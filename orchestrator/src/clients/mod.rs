//! Seams to the external collaborators: the chat model, the web search
//! provider and the vector index. Everything the pipeline calls over the
//! network goes through one of these traits so tests can swap in fakes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;

use crate::error::{GenerationError, ProviderError};
use crate::models::EvidenceChunk;

pub mod chat;
pub mod tavily;
pub mod vector_service;

pub use chat::ChatCompletionsClient;
pub use tavily::TavilyClient;
pub use vector_service::{VectorService, VectorServiceIndex};

/// Finite, non-restartable sequence of answer fragments. The last item is
/// an `Err` if generation broke off.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// A language model reachable with a system instruction and a user message.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the whole reply at once.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;

    /// Starts a reply and hands back its fragments as they arrive.
    async fn stream(&self, system: &str, user: &str) -> Result<FragmentStream, GenerationError>;
}

/// A raw hit from the web search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebHit {
    pub content: String,
    pub url: String,
}

#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>, ProviderError>;
}

/// One immutable snapshot of the document index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Returns up to `k` chunks ordered by descending similarity.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<EvidenceChunk>, ProviderError>;
}

/// Builds and restores index snapshots.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Persists a new snapshot built from `chunks`.
    async fn create_index(
        &self,
        chunks: &[EvidenceChunk],
    ) -> Result<Arc<dyn SearchIndex>, ProviderError>;

    /// Restores the persisted snapshot, if one exists.
    async fn load_index(&self) -> Result<Option<Arc<dyn SearchIndex>>, ProviderError>;
}

/// Bounds `fut` by `limit`, reporting expiry as a provider timeout.
pub async fn with_timeout<T, F>(
    provider: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout { provider, secs: limit.as_secs() }),
    }
}

/// Turns a non-success response into a `ProviderError`, keeping the body for the log.
pub(crate) async fn check_status(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited { provider });
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status { provider, status: status.as_u16(), body })
}
