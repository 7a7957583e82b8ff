// Generation Adapter: grounded answer over the assembled context

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use futures::{stream, StreamExt};
use tracing::{error, info};

use super::assembler::AssembledContext;
use crate::clients::{ChatModel, FragmentStream};
use crate::error::GenerationError;

pub const NO_EVIDENCE_MESSAGE: &str =
    "I couldn't find any information in the documents or on the web to answer your question.";

pub const ANSWER_PROMPT: &str = "You are a helpful knowledge assistant.
Answer the user's question using ONLY the provided context.

CRITICAL CITATION RULES:
1. Every factual statement must be cited using the format [Source ID].
2. Example: \"The transformer architecture uses self-attention [Source 1].\"
3. If the context has conflicting info, mention both and say they conflict.
4. If the answer is not in the context, state that you don't know.";

/// Either a finished message or fragments still to be consumed.
pub enum Answer {
    Message(String),
    Stream(FragmentStream),
}

impl fmt::Debug for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Message(text) => f.debug_tuple("Message").field(text).finish(),
            Answer::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl Answer {
    /// Drains the answer into one string. On a broken stream the text
    /// received so far is returned alongside the error.
    pub async fn collect(self) -> Result<String, (String, GenerationError)> {
        match self {
            Answer::Message(text) => Ok(text),
            Answer::Stream(mut fragments) => {
                let mut text = String::new();
                while let Some(fragment) = fragments.next().await {
                    match fragment {
                        Ok(piece) => text.push_str(&piece),
                        Err(e) => return Err((text, e)),
                    }
                }
                Ok(text)
            }
        }
    }
}

pub fn user_prompt(query: &str, context: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {query}")
}

pub struct GenerationAdapter {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl GenerationAdapter {
    /// `timeout` bounds the start of generation and every wait for the next fragment.
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Never asks the model to answer without evidence. A model that fails
    /// or times out before starting still yields a stream, whose only item
    /// is the error.
    pub async fn generate(&self, query: &str, context: &AssembledContext) -> Answer {
        if context.is_empty() {
            info!("Generator: no evidence, returning fixed message");
            return Answer::Message(NO_EVIDENCE_MESSAGE.to_string());
        }

        info!(sources = context.citations.len(), "Generator: streaming grounded answer");
        let prompt = user_prompt(query, &context.text);
        let started = tokio::time::timeout(self.timeout, self.model.stream(ANSWER_PROMPT, &prompt))
            .await
            .unwrap_or(Err(GenerationError::Timeout { secs: self.timeout.as_secs() }));

        match started {
            Ok(fragments) => Answer::Stream(bounded(fragments, self.timeout)),
            Err(e) => {
                error!(error = %e, "generator failed to start");
                Answer::Stream(Box::pin(stream::once(async move { Err(e) })))
            }
        }
    }
}

/// Ends the stream with `GenerationError::Timeout` once the model stays
/// silent for `idle`. Nothing is yielded after the first error.
fn bounded(mut fragments: FragmentStream, idle: Duration) -> FragmentStream {
    Box::pin(try_stream! {
        loop {
            let next = tokio::time::timeout(idle, fragments.next())
                .await
                .map_err(|_| GenerationError::Timeout { secs: idle.as_secs() })?;
            let Some(fragment) = next else { break };
            yield fragment?;
        }
    })
}
