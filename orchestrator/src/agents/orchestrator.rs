// Retrieval Orchestrator: applies the routing decision and merges evidence

use tracing::{info, instrument};

use super::retriever::DocumentRetriever;
use super::web::{WebOutcome, WebRetriever};
use crate::config::{DEFAULT_DOC_TOP_K, DEFAULT_WEB_MAX_RESULTS};
use crate::models::{EvidenceChunk, RetrievalMode, SearchResult};

/// What a document-mode query does when the index has nothing for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Document-only requests never reach the web.
    #[default]
    Never,
    /// Retry against the web when the index returns no chunks.
    WhenDocumentsEmpty,
}

pub struct RetrievalOrchestrator {
    documents: DocumentRetriever,
    web: WebRetriever,
    doc_top_k: usize,
    web_max_results: usize,
    fallback: FallbackPolicy,
}

impl RetrievalOrchestrator {
    pub fn new(documents: DocumentRetriever, web: WebRetriever) -> Self {
        Self {
            documents,
            web,
            doc_top_k: DEFAULT_DOC_TOP_K,
            web_max_results: DEFAULT_WEB_MAX_RESULTS,
            fallback: FallbackPolicy::default(),
        }
    }

    pub fn with_limits(mut self, doc_top_k: usize, web_max_results: usize) -> Self {
        self.doc_top_k = doc_top_k;
        self.web_max_results = web_max_results;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Document chunks always precede web chunks; neither list is re-ranked,
    /// deduplicated or capped beyond its own source limit.
    #[instrument(skip_all, fields(mode = %mode))]
    pub async fn retrieve(&self, query: &str, mode: RetrievalMode) -> SearchResult {
        let (documents, web) = match mode {
            RetrievalMode::Document => {
                let documents = self.documents.retrieve_documents(query, self.doc_top_k).await;
                let web = if documents.is_empty() && self.fallback == FallbackPolicy::WhenDocumentsEmpty {
                    info!("no document hits, escalating to web");
                    Some(self.web.search(query, self.web_max_results).await)
                } else {
                    None
                };
                (documents, web)
            }
            RetrievalMode::Web => (vec![], Some(self.web.search(query, self.web_max_results).await)),
            RetrievalMode::Hybrid => {
                let (documents, web) = tokio::join!(
                    self.documents.retrieve_documents(query, self.doc_top_k),
                    self.web.search(query, self.web_max_results),
                );
                (documents, Some(web))
            }
        };

        let result = merge(query, documents, web);
        info!(
            chunks = result.chunks.len(),
            used_web_fallback = result.used_web_fallback,
            "Orchestrator: evidence merged"
        );
        result
    }
}

/// Concatenates document chunks and web chunks in that order.
pub fn merge(query: &str, documents: Vec<EvidenceChunk>, web: Option<WebOutcome>) -> SearchResult {
    let used_web_fallback = web.is_some();
    let mut chunks = documents;
    let mut web_error = None;

    match web {
        Some(WebOutcome::Found(found)) => chunks.extend(found),
        Some(WebOutcome::Failed(reason)) => web_error = Some(reason),
        None => {}
    }

    SearchResult { query: query.to_string(), chunks, used_web_fallback, web_error }
}
