// OpenAI-compatible chat completions client (Groq by default)

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{check_status, with_timeout, ChatModel, FragmentStream};
use crate::error::{GenerationError, ProviderError};

const PROVIDER: &str = "chat-completions";
const DONE_SENTINEL: &str = "[DONE]";

pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(base_url: &str, api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            timeout,
        }
    }

    fn request<'a>(&'a self, system: &'a str, user: &'a str, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: 0.0,
            stream,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        check_status(PROVIDER, response).await
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    stream: bool,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Pulls the text fragment out of one SSE payload. `None` means the
/// payload carried no text (role-only deltas, usage frames).
fn parse_fragment(data: &str) -> Result<Option<String>, GenerationError> {
    let chunk: ChatChunk =
        serde_json::from_str(data).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty()))
}

#[async_trait]
impl ChatModel for ChatCompletionsClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let body = self.request(system, user, false);
        let reply: ChatResponse = with_timeout(PROVIDER, self.timeout, async {
            let response = self.send(&body).await?;
            Ok::<ChatResponse, ProviderError>(response.json().await?)
        })
        .await?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Malformed {
                provider: PROVIDER,
                message: "response has no message content".into(),
            })
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn stream(&self, system: &str, user: &str) -> Result<FragmentStream, GenerationError> {
        let body = self.request(system, user, true);
        let response = with_timeout(PROVIDER, self.timeout, self.send(&body)).await?;
        let mut events = Box::pin(response.bytes_stream().eventsource());
        let idle = self.timeout;

        let fragments: FragmentStream = Box::pin(try_stream! {
            loop {
                let next = tokio::time::timeout(idle, events.next())
                    .await
                    .map_err(|_| GenerationError::Timeout { secs: idle.as_secs() })?;
                let Some(event) = next else { break };
                let event = event.map_err(|e| GenerationError::Stream(e.to_string()))?;
                if event.data.trim() == DONE_SENTINEL {
                    debug!("generation stream finished");
                    break;
                }
                if let Some(text) = parse_fragment(&event.data)? {
                    yield text;
                }
            }
        });

        Ok(fragments)
    }
}
