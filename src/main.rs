//! Cachet demo server
//!
//! A small axum application demonstrating the response cache middleware:
//! `/time` and `/greeting` are cached, `/stats` and `/health` are not.
//! A `?clear=1` query on a cached route invalidates its entry.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, Request, State};
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde::Serialize;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tower_http::trace::TraceLayer;

use cachet::config::Config;
use cachet::store::StatsSnapshot;
use cachet::{response_cache_layer, CacheConfig, ResponseCache};

/// Main entry point for the demo server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the response cache (spawns the background sweep)
/// 4. Create the axum router with the cache layer on public routes
/// 5. Start the HTTP server on the configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cachet=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cachet demo server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: default_ttl={}s, max_body_bytes={}, port={}",
        config.default_ttl, config.max_body_bytes, config.server_port
    );

    let cache = ResponseCache::new(CacheConfig {
        default_ttl: Duration::from_secs(config.default_ttl),
        max_body_bytes: config.max_body_bytes,
        // Path plus the one query parameter the handlers vary on; the
        // default path-only key would collapse /greeting?lang=en and
        // /greeting?lang=es into one entry.
        key_for: Arc::new(|request: &Request| {
            let lang = request
                .uri()
                .query()
                .and_then(|query| {
                    query
                        .split('&')
                        .find_map(|pair| pair.strip_prefix("lang="))
                })
                .unwrap_or("");
            format!("{}?lang={}", request.uri().path(), lang)
        }),
        invalidate_when: Some(Arc::new(|request: &Request| {
            request
                .uri()
                .query()
                .is_some_and(|query| query.contains("clear=1"))
        })),
        ..CacheConfig::default()
    })?;
    info!("Response cache initialized");

    let app = create_router(cache);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Dropping the cache aborts the background sweep.
    info!("Server shutdown complete");
    Ok(())
}

/// Creates the demo router.
///
/// The cache layer wraps only the routes registered before it; `/stats` and
/// `/health` stay uncached.
fn create_router(cache: ResponseCache) -> Router {
    Router::new()
        .route("/time", get(time_handler))
        .route("/greeting", get(greeting_handler))
        .layer(middleware::from_fn_with_state(
            cache.clone(),
            response_cache_layer,
        ))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(cache)
}

/// Handler for GET /time
///
/// Returns the current timestamp; repeated requests within the TTL observe
/// the cached first response.
async fn time_handler() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Handler for GET /greeting?lang=xx
async fn greeting_handler(Query(params): Query<HashMap<String, String>>) -> String {
    match params.get("lang").map(String::as_str) {
        Some("es") => "hola".to_string(),
        Some("fr") => "bonjour".to_string(),
        _ => "hello".to_string(),
    }
}

/// Handler for GET /stats
async fn stats_handler(State(cache): State<ResponseCache>) -> Json<StatsSnapshot> {
    Json(cache.stats())
}

/// Response body for the health endpoint.
#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

/// Handler for GET /health
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
