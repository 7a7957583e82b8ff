// Query Router: picks which knowledge sources a query should consult

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::clients::{with_timeout, ChatModel};
use crate::error::ClassificationError;
use crate::models::RetrievalMode;

pub const ROUTER_PROMPT: &str = "You are an expert router.
- If the query requires specific internal knowledge likely found in uploaded documents (technical manuals, internal reports), choose 'document'.
- If the query requires real-time facts, news, or general knowledge not in static files, choose 'web'.
- If it might need both (e.g., comparing internal data to market trends), choose 'hybrid'.
Output only one word: document, web, or hybrid.";

/// Mode used whenever the classifier cannot be trusted; it consults both sources.
pub const DEFAULT_MODE: RetrievalMode = RetrievalMode::Hybrid;

pub struct QueryRouter {
    classifier: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl QueryRouter {
    pub fn new(classifier: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { classifier, timeout }
    }

    /// Never fails: provider errors and unexpected labels fall back to [`DEFAULT_MODE`].
    pub async fn classify(&self, query: &str) -> RetrievalMode {
        match self.try_classify(query).await {
            Ok(mode) => {
                info!(mode = %mode, "routing decision");
                mode
            }
            Err(e) => {
                warn!(error = %e, mode = %DEFAULT_MODE, "routing fell back to default mode");
                DEFAULT_MODE
            }
        }
    }

    pub async fn try_classify(&self, query: &str) -> Result<RetrievalMode, ClassificationError> {
        let call = self.classifier.complete(ROUTER_PROMPT, query);
        let raw = with_timeout("classifier", self.timeout, call).await?;
        parse_mode(&raw)
    }
}

/// Validates raw classifier output against the closed set of modes.
pub fn parse_mode(raw: &str) -> Result<RetrievalMode, ClassificationError> {
    // Quotes and a trailing period can nest either way round.
    let mut label = raw.trim();
    loop {
        let stripped = label
            .trim_end_matches('.')
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
            .trim();
        if stripped == label {
            break;
        }
        label = stripped;
    }

    label.to_lowercase().parse().map_err(|_| ClassificationError::UnknownLabel(raw.to_string()))
}
