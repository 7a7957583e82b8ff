use std::sync::Arc;

use tracing::{error, info};
use warp::{Rejection, Reply};

use crate::error::ApiError;
use crate::models::{IndexRequest, IndexResponse};
use crate::pipeline::{invalid_chunks, HybridRag};

pub async fn handle_index(
    request: IndexRequest,
    rag: Arc<HybridRag>,
) -> Result<impl Reply, Rejection> {
    info!("Building index from {} chunks", request.chunks.len());

    if request.chunks.is_empty() {
        return Err(warp::reject::custom(ApiError::BadRequest("no chunks to index".into())));
    }
    let invalid = invalid_chunks(&request.chunks);
    if !invalid.is_empty() {
        return Err(warp::reject::custom(ApiError::BadRequest(invalid.join("; "))));
    }

    let version = rag.ingest(&request.chunks).await.map_err(|e| {
        error!("Failed to build index: {}", e);
        warp::reject::custom(ApiError::Index(e))
    })?;

    let response = IndexResponse { version, chunk_count: request.chunks.len() };
    Ok(warp::reply::json(&response))
}
