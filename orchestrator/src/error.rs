use thiserror::Error;
use warp::{reject::Reject, Rejection, Reply};

/// Fatal startup failure; no session may start while one is present.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required credential: {0}")]
    MissingCredential(&'static str),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Failure of an external collaborator (index, web search, model).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} timed out after {secs}s")]
    Timeout { provider: &'static str, secs: u64 },

    #[error("{provider} returned {status}: {body}")]
    Status { provider: &'static str, status: u16, body: String },

    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: &'static str },

    #[error("{provider} returned a malformed payload: {message}")]
    Malformed { provider: &'static str, message: String },
}

/// The router could not obtain a usable label.
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Classifier call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Classifier returned an unknown label: {0:?}")]
    UnknownLabel(String),
}

/// Terminal failure of a generation stream.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generator call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Generation stream broke: {0}")]
    Stream(String),

    #[error("Generator sent a malformed fragment: {0}")]
    Malformed(String),

    #[error("Generator produced nothing for {secs}s")]
    Timeout { secs: u64 },
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Generation failed: {message}")]
    Generation { message: String, partial: String },

    #[error("Index update failed: {0}")]
    Index(#[from] ProviderError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Reject for ApiError {}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(api_err) = err.find::<ApiError>() {
        let (code, message) = match api_err {
            ApiError::BadRequest(_) => (400, "Bad request"),
            ApiError::RateLimitExceeded => (429, "Rate limit exceeded"),
            ApiError::Generation { .. } => (502, "Answer generation failed"),
            ApiError::Index(_) => (502, "Index service failed"),
            ApiError::SerializationError(_) => (500, "Internal server error"),
        };

        let mut body = serde_json::json!({
            "error": message,
            "details": api_err.to_string(),
        });
        if let ApiError::Generation { partial, .. } = api_err {
            body["partial_answer"] = serde_json::Value::String(partial.clone());
        }

        let status = warp::http::StatusCode::from_u16(code)
            .unwrap_or(warp::http::StatusCode::INTERNAL_SERVER_ERROR);
        Ok(warp::reply::with_status(warp::reply::json(&body), status))
    } else {
        Err(err)
    }
}
