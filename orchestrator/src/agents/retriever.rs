// Document Retriever: ranked evidence from the current index snapshot

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::clients::with_timeout;
use crate::error::ProviderError;
use crate::index::IndexHandle;
use crate::models::EvidenceChunk;

pub struct DocumentRetriever {
    index: Arc<IndexHandle>,
    timeout: Duration,
}

impl DocumentRetriever {
    pub fn new(index: Arc<IndexHandle>, timeout: Duration) -> Self {
        Self { index, timeout }
    }

    /// Returns an empty list when no snapshot is published, nothing matches,
    /// or the index call fails.
    pub async fn retrieve_documents(&self, query: &str, k: usize) -> Vec<EvidenceChunk> {
        match self.try_retrieve(query, k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "document retrieval failed, continuing without documents");
                vec![]
            }
        }
    }

    pub async fn try_retrieve(&self, query: &str, k: usize) -> Result<Vec<EvidenceChunk>, ProviderError> {
        let Some(snapshot) = self.index.snapshot().await else {
            info!("Retriever: index not initialized");
            return Ok(vec![]);
        };

        let hits = with_timeout("index", self.timeout, snapshot.index.search(query, k)).await?;
        let chunks: Vec<EvidenceChunk> = hits
            .into_iter()
            .filter(|chunk| match chunk.validate() {
                Ok(()) => true,
                Err(reason) => {
                    warn!(%reason, "dropping invalid document chunk");
                    false
                }
            })
            .take(k)
            .collect();

        info!(version = snapshot.version, hits = chunks.len(), "Retriever: documents retrieved");
        Ok(chunks)
    }
}
