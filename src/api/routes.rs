//! Router assembly and server startup.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::llm::{build_client, ClientRef};
use crate::orchestrator::{LaunchService, Orchestrator};
use crate::store::SqliteStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Launch records and task results
    pub store: Arc<SqliteStore>,
    /// Run admission and progress
    pub service: LaunchService,
    /// Inference client, used here only for the health endpoint
    pub client: ClientRef,
}

impl AppState {
    /// Wire the store, client and orchestrator together.
    pub fn new(config: Config, store: Arc<SqliteStore>, client: ClientRef) -> anyhow::Result<Self> {
        let orchestrator = Orchestrator::standard(
            store.clone(),
            Arc::clone(&client),
            config.execution.clone(),
        )?;
        let service = LaunchService::new(store.clone(), Arc::new(orchestrator));
        Ok(Self {
            config,
            store,
            service,
            client,
        })
    }
}

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/launches", super::launches::routes())
        .nest("/api/orchestrator", super::orchestrator::routes())
        .layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    tracing::info!("Opened database at {}", config.database_path.display());

    let client = build_client(&config.inference);
    tracing::info!(
        "Using {} inference at {} with model {}",
        config.inference.provider.as_str(),
        config.inference.base_url,
        client.model()
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, store, client)?);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// GET /
async fn root() -> Json<Value> {
    Json(json!({
        "message": "Launch Orchestrator API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let reachable = state.client.health_check().await;
    Json(json!({
        "status": "healthy",
        "inference": {
            "provider": state.config.inference.provider.as_str(),
            "model": state.client.model(),
            "reachable": reachable,
        },
    }))
}
