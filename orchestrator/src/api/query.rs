use std::convert::Infallible;
use std::sync::Arc;

use chrono::Utc;
use futures::{stream, Stream, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;
use warp::sse::Event;
use warp::{Rejection, Reply};

use crate::agents::Answer;
use crate::clients::FragmentStream;
use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::models::{Citation, QueryRequest, QueryResponse, RetrievalMode};
use crate::pipeline::HybridRag;

fn validate_query(query: &str) -> Result<&str, Rejection> {
    let query = query.trim();
    if query.is_empty() {
        return Err(warp::reject::custom(ApiError::BadRequest("query must not be empty".into())));
    }
    Ok(query)
}

pub async fn handle_query(
    request: QueryRequest,
    rag: Arc<HybridRag>,
) -> Result<impl Reply, Rejection> {
    let query = validate_query(&request.query)?;
    let request_id = Uuid::new_v4();
    info!("Processing query [{}]: {}", request_id, query);

    let prepared = rag.prepare(query, request.mode).await;

    let answer = match prepared.answer.collect().await {
        Ok(answer) => answer,
        Err((partial, e)) => {
            rag.metrics().record_generation_error();
            error!("Generation failed for [{}]: {}", request_id, e);
            return Err(warp::reject::custom(ApiError::Generation {
                message: e.to_string(),
                partial,
            }));
        }
    };

    let unresolved_citations = prepared.context.citations.unresolved(&answer);
    if !unresolved_citations.is_empty() {
        warn!(request_id = %request_id, ?unresolved_citations, "answer cites sources that were not supplied");
    }

    let response = QueryResponse {
        request_id,
        query: query.to_string(),
        mode: prepared.mode,
        used_web_fallback: prepared.result.used_web_fallback,
        web_error: prepared.result.web_error,
        answer,
        citations: prepared.context.citations.citations(),
        unresolved_citations,
        created_at: Utc::now(),
    };

    Ok(warp::reply::json(&response))
}

#[derive(Serialize)]
struct EvidenceEvent {
    request_id: Uuid,
    mode: RetrievalMode,
    used_web_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_error: Option<String>,
    citations: Vec<Citation>,
}

/// SSE flavour of [`handle_query`]: `evidence`, then `token`s or a single
/// `message`, then exactly one `done` or `error`.
pub async fn handle_query_stream(
    request: QueryRequest,
    rag: Arc<HybridRag>,
) -> Result<impl Reply, Rejection> {
    let query = validate_query(&request.query)?;
    let request_id = Uuid::new_v4();
    info!("Streaming query [{}]: {}", request_id, query);

    let prepared = rag.prepare(query, request.mode).await;

    let evidence = EvidenceEvent {
        request_id,
        mode: prepared.mode,
        used_web_fallback: prepared.result.used_web_fallback,
        web_error: prepared.result.web_error,
        citations: prepared.context.citations.citations(),
    };
    let head = Event::default()
        .event("evidence")
        .data(serde_json::to_string(&evidence).map_err(|e| warp::reject::custom(ApiError::from(e)))?);

    let body = match prepared.answer {
        Answer::Message(text) => stream::iter([
            Ok::<_, Infallible>(Event::default().event("message").data(text)),
            Ok(Event::default().event("done").data("")),
        ])
        .boxed(),
        Answer::Stream(fragments) => {
            fragment_events(request_id, fragments, rag.metrics().clone()).boxed()
        }
    };

    let events = stream::once(async move { Ok::<_, Infallible>(head) }).chain(body);
    Ok(warp::sse::reply(warp::sse::keep_alive().stream(events)))
}

fn fragment_events(
    request_id: Uuid,
    mut fragments: FragmentStream,
    metrics: Metrics,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    async_stream::stream! {
        let mut failed = false;
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) => yield Ok(Event::default().event("token").data(text)),
                Err(e) => {
                    metrics.record_generation_error();
                    error!("Generation failed for [{}]: {}", request_id, e);
                    yield Ok(Event::default().event("error").data(e.to_string()));
                    failed = true;
                    break;
                }
            }
        }
        if !failed {
            yield Ok(Event::default().event("done").data(""));
        }
    }
}
