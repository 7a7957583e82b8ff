#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};

use hybrid_rag::clients::{
    ChatModel, FragmentStream, IndexStore, SearchIndex, WebHit, WebSearchProvider,
};
use hybrid_rag::error::{GenerationError, ProviderError};
use hybrid_rag::metrics::Metrics;
use hybrid_rag::models::{EvidenceChunk, SourceKind};
use hybrid_rag::pipeline::{Collaborators, HybridRag, Settings};

/// Chat model that answers classification with a fixed label and
/// generation with a fixed list of fragments.
pub struct MockChat {
    pub label: Result<String, ()>,
    pub fragments: Vec<Result<String, String>>,
    pub fail_to_start: bool,
    /// Goes silent after the last fragment instead of ending the stream.
    pub stall: bool,
    pub complete_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub last_stream_prompt: Mutex<Option<(String, String)>>,
}

impl MockChat {
    pub fn new(label: &str) -> Self {
        Self {
            label: Ok(label.to_string()),
            fragments: vec![Ok("Answer ".into()), Ok("[Source 1].".into())],
            fail_to_start: false,
            stall: false,
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            last_stream_prompt: Mutex::new(None),
        }
    }

    pub fn failing_classifier() -> Self {
        Self { label: Err(()), ..Self::new("") }
    }

    pub fn with_fragments(mut self, fragments: Vec<Result<&str, &str>>) -> Self {
        self.fragments = fragments
            .into_iter()
            .map(|f| f.map(str::to_string).map_err(str::to_string))
            .collect();
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for MockChat {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.label.clone().map_err(|_| ProviderError::Status {
            provider: "mock-chat",
            status: 503,
            body: "unavailable".into(),
        })
    }

    async fn stream(&self, system: &str, user: &str) -> Result<FragmentStream, GenerationError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_stream_prompt.lock().unwrap() = Some((system.to_string(), user.to_string()));
        if self.fail_to_start {
            return Err(GenerationError::Provider(ProviderError::RateLimited { provider: "mock-chat" }));
        }
        let items: Vec<Result<String, GenerationError>> = self
            .fragments
            .iter()
            .cloned()
            .map(|f| f.map_err(GenerationError::Stream))
            .collect();
        if self.stall {
            return Ok(Box::pin(stream::iter(items).chain(stream::pending())));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

pub struct MockWeb {
    pub hits: Vec<WebHit>,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl MockWeb {
    pub fn returning(hits: Vec<WebHit>) -> Self {
        Self { hits, fail: false, delay: None, calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::returning(vec![]) }
    }

    pub fn slow(delay: Duration, hits: Vec<WebHit>) -> Self {
        Self { delay: Some(delay), ..Self::returning(hits) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearchProvider for MockWeb {
    fn name(&self) -> &str {
        "mock-web"
    }

    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<WebHit>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ProviderError::RateLimited { provider: "mock-web" });
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

/// Index snapshot returning fixed chunks and counting searches.
pub struct MockIndex {
    pub chunks: Vec<EvidenceChunk>,
    pub fail: bool,
    pub calls: Arc<AtomicUsize>,
}

impl MockIndex {
    pub fn new(chunks: Vec<EvidenceChunk>) -> Self {
        Self { chunks, fail: false, calls: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new(vec![]) }
    }
}

#[async_trait]
impl SearchIndex for MockIndex {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<EvidenceChunk>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Malformed { provider: "mock-index", message: "corrupt".into() });
        }
        Ok(self.chunks.iter().take(k).cloned().collect())
    }
}

/// Index store that keeps snapshots in memory.
#[derive(Default)]
pub struct MockStore {
    pub persisted: Mutex<Option<Vec<EvidenceChunk>>>,
    pub fail: bool,
    /// Batches whose first chunk has this id take five seconds to build.
    pub slow_batch: Option<&'static str>,
}

impl MockStore {
    pub fn with_snapshot(chunks: Vec<EvidenceChunk>) -> Self {
        Self { persisted: Mutex::new(Some(chunks)), ..Self::default() }
    }
}

#[async_trait]
impl IndexStore for MockStore {
    async fn create_index(
        &self,
        chunks: &[EvidenceChunk],
    ) -> Result<Arc<dyn SearchIndex>, ProviderError> {
        if self.slow_batch.is_some() && chunks.first().map(|c| c.id.as_str()) == self.slow_batch {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        if self.fail {
            return Err(ProviderError::Status { provider: "mock-store", status: 500, body: "boom".into() });
        }
        *self.persisted.lock().unwrap() = Some(chunks.to_vec());
        Ok(Arc::new(MockIndex::new(chunks.to_vec())))
    }

    async fn load_index(&self) -> Result<Option<Arc<dyn SearchIndex>>, ProviderError> {
        let persisted = self.persisted.lock().unwrap().clone();
        Ok(persisted.map(|chunks| Arc::new(MockIndex::new(chunks)) as Arc<dyn SearchIndex>))
    }
}

pub fn build(
    chat: Arc<MockChat>,
    web: Arc<MockWeb>,
    store: Arc<MockStore>,
    settings: Settings,
) -> HybridRag {
    HybridRag::new(
        Collaborators { chat, web, index_store: store },
        settings,
        Metrics::new().unwrap(),
    )
}

pub fn doc(id: &str, page: Option<u32>) -> EvidenceChunk {
    EvidenceChunk {
        id: id.into(),
        source_id: "manual.pdf".into(),
        source_kind: SourceKind::InternalDocument,
        title: "manual.pdf".into(),
        content: format!("Contents of {id}."),
        page_number: page,
        url: None,
        section_label: None,
    }
}

pub fn hit(content: &str, url: &str) -> WebHit {
    WebHit { content: content.into(), url: url.into() }
}
