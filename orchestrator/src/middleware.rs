use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use warp::{Filter, Rejection};

use crate::error::ApiError;

pub type QueryLimiter = Arc<DefaultDirectRateLimiter>;

pub fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec![
            "User-Agent",
            "Origin",
            "Access-Control-Request-Method",
            "Access-Control-Request-Headers",
            "Content-Type",
            "Authorization",
            "Accept",
            "Cache-Control",
            "Last-Event-ID",
            "Content-Length",
        ])
        .allow_methods(vec!["POST", "GET", "OPTIONS"])
}

pub fn query_limiter(per_minute: u32) -> QueryLimiter {
    let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

/// Rejects with `ApiError::RateLimitExceeded` once the shared quota is spent.
pub fn rate_limit(limiter: QueryLimiter) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::any()
        .and_then(move || {
            let limiter = limiter.clone();
            async move {
                match limiter.check() {
                    Ok(()) => Ok(()),
                    Err(_) => Err(warp::reject::custom(ApiError::RateLimitExceeded)),
                }
            }
        })
        .untuple_one()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_once_quota_is_spent() {
        let filter = rate_limit(query_limiter(2));
        assert!(warp::test::request().filter(&filter).await.is_ok());
        assert!(warp::test::request().filter(&filter).await.is_ok());

        let rejection = warp::test::request().filter(&filter).await.unwrap_err();
        assert!(matches!(rejection.find::<ApiError>(), Some(ApiError::RateLimitExceeded)));
    }
}
