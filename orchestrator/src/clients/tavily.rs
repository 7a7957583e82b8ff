// Tavily web search client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{check_status, with_timeout, WebHit, WebSearchProvider};
use crate::error::ProviderError;

const PROVIDER: &str = "tavily";

pub struct TavilyClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl TavilyClient {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Keeps hits that carry both text and a link, in provider order.
fn into_hits(response: SearchResponse, max_results: usize) -> Vec<WebHit> {
    response
        .results
        .into_iter()
        .filter_map(|hit| match (hit.content, hit.url) {
            (Some(content), Some(url)) if !content.trim().is_empty() => Some(WebHit { content, url }),
            _ => None,
        })
        .take(max_results)
        .collect()
}

#[async_trait]
impl WebSearchProvider for TavilyClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip_all, fields(max_results = max_results))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>, ProviderError> {
        let body = SearchRequest { api_key: &self.api_key, query, max_results };

        let response: SearchResponse = with_timeout(PROVIDER, self.timeout, async {
            let response = self
                .client
                .post(format!("{}/search", self.base_url))
                .json(&body)
                .send()
                .await?;
            let response = check_status(PROVIDER, response).await?;
            response.json::<SearchResponse>().await.map_err(|e| ProviderError::Malformed {
                provider: PROVIDER,
                message: e.to_string(),
            })
        })
        .await?;

        let hits = into_hits(response, max_results);
        debug!(hits = hits.len(), "web search completed");
        Ok(hits)
    }
}
