//! The query pipeline: route, retrieve, assemble, generate.
//!
//! [`HybridRag`] owns every collaborator handle. It is built once at
//! startup from explicitly constructed clients and shared behind an `Arc`;
//! it keeps no per-query state of its own.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::agents::{
    assemble, Answer, AssembledContext, DocumentRetriever, FallbackPolicy, GenerationAdapter,
    QueryRouter, RetrievalOrchestrator, WebRetriever,
};
use crate::clients::{ChatModel, IndexStore, WebSearchProvider};
use crate::config::{Config, Timeouts, DEFAULT_DOC_TOP_K, DEFAULT_WEB_MAX_RESULTS};
use crate::error::ProviderError;
use crate::index::IndexHandle;
use crate::metrics::Metrics;
use crate::models::{EvidenceChunk, RetrievalMode, SearchResult};

/// External services the pipeline talks to.
pub struct Collaborators {
    /// Used for both classification and generation.
    pub chat: Arc<dyn ChatModel>,
    pub web: Arc<dyn WebSearchProvider>,
    pub index_store: Arc<dyn IndexStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub doc_top_k: usize,
    pub web_max_results: usize,
    pub fallback: FallbackPolicy,
    pub timeouts: Timeouts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            doc_top_k: DEFAULT_DOC_TOP_K,
            web_max_results: DEFAULT_WEB_MAX_RESULTS,
            fallback: FallbackPolicy::Never,
            timeouts: Timeouts::default(),
        }
    }
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            doc_top_k: config.doc_top_k,
            web_max_results: config.web_max_results,
            fallback: if config.document_web_fallback {
                FallbackPolicy::WhenDocumentsEmpty
            } else {
                FallbackPolicy::Never
            },
            timeouts: config.timeouts,
        }
    }
}

/// Everything produced for one query before its answer is consumed.
#[derive(Debug)]
pub struct Prepared {
    pub mode: RetrievalMode,
    pub result: SearchResult,
    pub context: AssembledContext,
    pub answer: Answer,
}

pub struct HybridRag {
    router: QueryRouter,
    orchestrator: RetrievalOrchestrator,
    generator: GenerationAdapter,
    index: Arc<IndexHandle>,
    index_store: Arc<dyn IndexStore>,
    /// Held across build and publish so snapshot versions follow request order.
    rebuild: Mutex<()>,
    metrics: Metrics,
}

impl HybridRag {
    pub fn new(collaborators: Collaborators, settings: Settings, metrics: Metrics) -> Self {
        let index = Arc::new(IndexHandle::new());
        let documents = DocumentRetriever::new(index.clone(), settings.timeouts.search);
        let web = WebRetriever::new(collaborators.web, settings.timeouts.web);
        let orchestrator = RetrievalOrchestrator::new(documents, web)
            .with_limits(settings.doc_top_k, settings.web_max_results)
            .with_fallback(settings.fallback);

        Self {
            router: QueryRouter::new(collaborators.chat.clone(), settings.timeouts.classify),
            orchestrator,
            generator: GenerationAdapter::new(collaborators.chat, settings.timeouts.generation),
            index,
            index_store: collaborators.index_store,
            rebuild: Mutex::new(()),
            metrics,
        }
    }

    pub fn index(&self) -> &Arc<IndexHandle> {
        &self.index
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn route(&self, query: &str) -> RetrievalMode {
        self.router.classify(query).await
    }

    pub async fn retrieve(&self, query: &str, mode: RetrievalMode) -> SearchResult {
        let result = self.orchestrator.retrieve(query, mode).await;
        self.metrics.record_query(mode, result.used_web_fallback);
        if result.web_error.is_some() {
            self.metrics.record_web_failure();
        }
        result
    }

    pub fn assemble(&self, result: &SearchResult) -> AssembledContext {
        assemble(result)
    }

    pub async fn generate(&self, query: &str, context: &AssembledContext) -> Answer {
        if context.is_empty() {
            self.metrics.record_empty_evidence();
        }
        self.generator.generate(query, context).await
    }

    /// Runs the pipeline up to the point where the answer can be consumed.
    /// `mode` skips the router when given.
    #[instrument(skip_all, fields(forced_mode = ?mode))]
    pub async fn prepare(&self, query: &str, mode: Option<RetrievalMode>) -> Prepared {
        let mode = match mode {
            Some(mode) => mode,
            None => self.route(query).await,
        };
        let result = self.retrieve(query, mode).await;
        let context = self.assemble(&result);
        let answer = self.generate(query, &context).await;
        Prepared { mode, result, context, answer }
    }

    /// Restores the persisted snapshot at startup. Returns its version.
    pub async fn load_index(&self) -> Result<Option<u64>, ProviderError> {
        let _rebuild = self.rebuild.lock().await;
        let Some(index) = self.index_store.load_index().await? else {
            return Ok(None);
        };
        let version = self.index.publish(index).await;
        self.metrics.set_index_version(version);
        Ok(Some(version))
    }

    /// Builds a snapshot from `chunks` and publishes it as the next version.
    /// Concurrent calls run one at a time, in the order they asked.
    pub async fn ingest(&self, chunks: &[EvidenceChunk]) -> Result<u64, ProviderError> {
        let _rebuild = self.rebuild.lock().await;
        let index = self.index_store.create_index(chunks).await?;
        let version = self.index.publish(index).await;
        self.metrics.set_index_version(version);
        info!(version, chunks = chunks.len(), "Indexed chunks");
        Ok(version)
    }
}

/// Reasons each unfit chunk in `chunks` may not be indexed.
pub fn invalid_chunks(chunks: &[EvidenceChunk]) -> Vec<String> {
    chunks.iter().filter_map(|chunk| chunk.validate().err()).collect()
}
