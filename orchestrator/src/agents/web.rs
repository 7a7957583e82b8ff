// Web Retriever: normalized evidence from the live search provider

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::clients::{with_timeout, WebHit, WebSearchProvider};
use crate::models::{EvidenceChunk, SourceKind};

/// Title given to every web chunk; the provider's own titles are not trusted.
pub const WEB_RESULT_TITLE: &str = "Web Result";

/// What a web lookup produced. `Failed` keeps the reason visible to callers
/// that care, while [`WebOutcome::into_chunks`] collapses it to "no evidence".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebOutcome {
    Found(Vec<EvidenceChunk>),
    Failed(String),
}

impl WebOutcome {
    pub fn into_chunks(self) -> Vec<EvidenceChunk> {
        match self {
            WebOutcome::Found(chunks) => chunks,
            WebOutcome::Failed(_) => vec![],
        }
    }
}

pub struct WebRetriever {
    provider: Arc<dyn WebSearchProvider>,
    timeout: Duration,
}

impl WebRetriever {
    pub fn new(provider: Arc<dyn WebSearchProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub async fn retrieve_web(&self, query: &str, max_results: usize) -> Vec<EvidenceChunk> {
        self.search(query, max_results).await.into_chunks()
    }

    /// Like [`retrieve_web`](Self::retrieve_web) but reports provider failures.
    pub async fn search(&self, query: &str, max_results: usize) -> WebOutcome {
        let search = self.provider.search(query, max_results);
        match with_timeout("web", self.timeout, search).await {
            Ok(hits) => {
                let chunks = to_chunks(self.provider.name(), hits, max_results);
                info!(provider = self.provider.name(), hits = chunks.len(), "Web: results retrieved");
                WebOutcome::Found(chunks)
            }
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "web search failed");
                WebOutcome::Failed(e.to_string())
            }
        }
    }
}

fn to_chunks(provider: &str, hits: Vec<WebHit>, max_results: usize) -> Vec<EvidenceChunk> {
    hits.into_iter()
        .filter(|hit| !hit.content.trim().is_empty())
        .take(max_results)
        .enumerate()
        .map(|(i, hit)| EvidenceChunk {
            id: format!("web-{}", i + 1),
            source_id: provider.to_string(),
            source_kind: SourceKind::Web,
            title: WEB_RESULT_TITLE.to_string(),
            content: hit.content,
            page_number: None,
            url: Some(hit.url),
            section_label: None,
        })
        .collect()
}
