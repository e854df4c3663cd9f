use anyhow::Result;
use axum::{routing::get, Json, Router};
use coverage_engine::{CoverageEngine, EngineConfig};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod routes;

/// Full application router; shared with the handler tests
pub fn app(engine: routes::SharedEngine) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/coverage", routes::coverage_router(engine))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "coverage_gateway=debug,coverage_engine=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env()?;
    tracing::info!(
        radius_km = config.radius_km,
        days_back = config.days_back,
        cache_ttl_secs = config.cache_ttl_secs,
        seeded = config.report_seed.is_some(),
        "Engine configuration loaded"
    );
    if config.ai.is_some() {
        tracing::info!("   AI scoring enabled, heuristic fallback on failure");
    } else {
        tracing::warn!("   COVERAGE_AI_API_KEY not set, heuristic scoring only");
    }

    let engine = Arc::new(CoverageEngine::from_config(config)?);
    let app = app(engine);

    let port = std::env::var("COVERAGE_GATEWAY_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "18610".to_string());
    let addr = format!("0.0.0.0:{}", port);

    tracing::info!("Coverage Gateway starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "coverage-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
