use std::convert::Infallible;
use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::middleware::{rate_limit, QueryLimiter};
use crate::pipeline::HybridRag;

mod index;
mod query;

/// JSON bodies above this size are refused before parsing.
const MAX_INDEX_BODY: u64 = 64 * 1024 * 1024;
const MAX_QUERY_BODY: u64 = 64 * 1024;

pub fn routes(
    rag: Arc<HybridRag>,
    limiter: QueryLimiter,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let api = warp::path("api").and(warp::path("v1"));

    let query_route = api
        .and(warp::path("query"))
        .and(warp::path::end())
        .and(warp::post())
        .and(rate_limit(limiter.clone()))
        .and(warp::body::content_length_limit(MAX_QUERY_BODY))
        .and(warp::body::json())
        .and(with_rag(rag.clone()))
        .and_then(query::handle_query);

    let stream_route = api
        .and(warp::path("query"))
        .and(warp::path("stream"))
        .and(warp::path::end())
        .and(warp::post())
        .and(rate_limit(limiter))
        .and(warp::body::content_length_limit(MAX_QUERY_BODY))
        .and(warp::body::json())
        .and(with_rag(rag.clone()))
        .and_then(query::handle_query_stream);

    let index_route = api
        .and(warp::path("index"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_INDEX_BODY))
        .and(warp::body::json())
        .and(with_rag(rag))
        .and_then(index::handle_index);

    query_route.or(stream_route).or(index_route)
}

fn with_rag(
    rag: Arc<HybridRag>,
) -> impl Filter<Extract = (Arc<HybridRag>,), Error = Infallible> + Clone {
    warp::any().map(move || rag.clone())
}
