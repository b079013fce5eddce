//! Checkout History API Server
//!
//! `POST /` records a checkout, `GET /` lists every recorded checkout.

use anyhow::Context;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod routes;

pub use config::{LogFormat, Settings, SettingsError};
pub use error::ApiError;

use history_storage::Repository;
use rate_limit::RateLimitConfig;

/// Application state shared across handlers
pub struct AppState {
    /// Checkout history repository; owns the connection pool
    pub repository: Repository,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    /// Prometheus handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(repository: Repository) -> Self {
        Self {
            repository,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/",
            get(routes::history::list_history).post(routes::history::checkout),
        )
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::health::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Router with optional per-IP rate limiting applied
pub fn build_app(
    state: Arc<AppState>,
    rate_limit: Option<&RateLimitConfig>,
) -> Result<Router, SettingsError> {
    let router = create_router(state);
    match rate_limit {
        Some(config) => {
            info!(
                "Rate limiting enabled: {} req/s, burst {}",
                config.requests_per_second, config.burst_size
            );
            Ok(router.layer(rate_limit::layer(config)?))
        }
        None => Ok(router),
    }
}

/// Initialize logging to stderr
pub fn init_logging(
    level: Level,
    format: LogFormat,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    }
}

/// Serve `app` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Run the server
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let database = settings.database();
    info!("Connecting to database {}", database.redacted_url());
    let repository = Repository::connect(&database)
        .await
        .context("Unable to connect to database")?;

    let mut state = AppState::new(repository);
    if let Some(handle) = init_metrics() {
        state = state.with_metrics(handle);
    }
    let state = Arc::new(state);

    let app = build_app(state.clone(), settings.rate_limit().as_ref())?;

    let addr = settings.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Starting API server on {}", addr);
    let served = serve(listener, app, shutdown_signal()).await;

    state.repository.close().await;
    served.context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
