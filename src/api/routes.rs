//! HTTP route wiring and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, response::Json, routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::limiter::{AdmissionLimiter, SharedAdmissionLimiter};
use crate::reconciler::Reconciler;
use crate::store::{SharedTaskStore, SqliteTaskStore};

use super::rate_limit;
use super::tasks;
use super::types::HealthResponse;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: SharedTaskStore,
    /// Per-client admission counters, shared by every request.
    pub limiter: SharedAdmissionLimiter,
}

impl AppState {
    pub fn new(config: Config, store: SharedTaskStore) -> Self {
        let limiter = Arc::new(AdmissionLimiter::new(config.rate_limit));
        Self {
            config,
            store,
            limiter,
        }
    }
}

/// Build the router. Every route sits behind the admission limiter.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .nest("/tasks", tasks::routes())
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            rate_limit::rate_limit,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server together with the reconciler and the rate-limit
/// janitor. Both background tasks stop when the server shuts down.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store: SharedTaskStore = Arc::new(SqliteTaskStore::open(&config.database_path)?);
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&store)));

    let background = CancellationToken::new();
    let reconciler = Reconciler::new(Arc::clone(&store), config.reconcile_interval)
        .spawn(background.child_token());
    let janitor = state.limiter.spawn_janitor(background.child_token());

    let app = router(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    background.cancel();
    for (name, handle) in [("reconciler", reconciler), ("rate-limit janitor", janitor)] {
        if let Err(e) = handle.await {
            tracing::error!("Background {} task failed: {}", name, e);
        }
    }
    tracing::info!("Graceful shutdown complete");

    served?;
    Ok(())
}

/// Wait for SIGTERM/SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping background tasks...");
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
