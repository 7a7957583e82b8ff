use std::sync::Arc;

use tracing::{error, info, warn};
use warp::Filter;

use hybrid_rag::clients::{ChatCompletionsClient, TavilyClient, VectorService};
use hybrid_rag::config::Config;
use hybrid_rag::error::handle_rejection;
use hybrid_rag::metrics::Metrics;
use hybrid_rag::pipeline::{Collaborators, HybridRag, Settings};
use hybrid_rag::{api, middleware};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    info!("Starting Hybrid RAG Orchestrator");

    // Missing credentials stop the service before anything is served
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;
    info!("Configuration loaded");

    let chat = Arc::new(ChatCompletionsClient::new(
        &config.llm_base_url,
        config.groq_api_key.clone(),
        config.llm_model.clone(),
        config.timeouts.generation,
    ));
    let web = Arc::new(TavilyClient::new(
        &config.tavily_url,
        config.tavily_api_key.clone(),
        config.timeouts.web,
    ));
    let index_store = Arc::new(VectorService::new(
        &config.embedding_service_url,
        &config.vector_db_service_url,
        config.embedding_model.clone(),
        config.index_path.clone(),
        config.timeouts.search,
    ));

    let metrics = Metrics::new()?;
    let rag = Arc::new(HybridRag::new(
        Collaborators { chat, web, index_store },
        Settings::from_config(&config),
        metrics.clone(),
    ));
    info!(model = %config.llm_model, "Collaborators initialized");

    match rag.load_index().await {
        Ok(Some(version)) => info!(version, "Index snapshot loaded"),
        Ok(None) => info!("No index snapshot yet; document retrieval is empty until one is built"),
        Err(e) => warn!("Failed to load index snapshot: {}", e),
    }

    // Build API routes
    let limiter = middleware::query_limiter(config.query_rate_limit_per_minute);
    let api_routes = api::routes(rag.clone(), limiter)
        .with(warp::log("api"))
        .with(middleware::cors());

    // Health check route
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({"status": "healthy"})));

    // Metrics route
    let metrics_route = warp::path("metrics").and(warp::get()).map(move || {
        let (buffer, content_type) = metrics.render().unwrap_or_else(|e| {
            error!("Failed to encode metrics: {}", e);
            (Vec::new(), "text/plain".to_string())
        });
        warp::reply::with_header(buffer, "Content-Type", content_type)
    });

    let routes = health.or(metrics_route).or(api_routes).recover(handle_rejection);

    // Start server
    let addr = ([0, 0, 0, 0], config.port);
    info!("Server listening on {}", addr.1);

    warp::serve(routes).run(addr).await;

    Ok(())
}
