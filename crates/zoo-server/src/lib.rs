#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

mod error;
mod health;
mod models;
mod predictions;
mod state;
mod submissions;
mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use zoo_config::Config;
use zoo_orchestrator::SubmissionOrchestrator;
use zoo_providers::{PredictionPoller, ProviderRegistry, WEBHOOK_PATH};
use zoo_store::{InMemoryPredictionStore, PredictionStore};

pub use error::ApiError;
pub use state::AppState;

/// Assembled HTTP server
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    orchestrator: SubmissionOrchestrator,
}

impl Server {
    /// Build the server with a process-local prediction store
    ///
    /// # Errors
    ///
    /// Returns an error if a provider adapter cannot be built
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_store(config, Arc::new(InMemoryPredictionStore::new()))
    }

    /// Build the server on top of an existing prediction store
    ///
    /// # Errors
    ///
    /// Returns an error if a provider adapter cannot be built
    pub fn with_store(config: Config, store: Arc<dyn PredictionStore>) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let registry = ProviderRegistry::from_config(&config.providers)
            .map_err(|e| anyhow::anyhow!("failed to initialize providers: {e}"))?;
        let orchestrator = SubmissionOrchestrator::new(registry, store, PredictionPoller::new(config.poller.interval));

        let state = AppState {
            orchestrator: orchestrator.clone(),
            models: config.models.into(),
        };

        let router = Router::new()
            .route(&config.server.health_path, get(health::health_handler))
            .route("/api/models", get(models::list_models))
            .route("/api/predictions", post(predictions::create_prediction))
            .route("/api/predictions/{id}", get(predictions::get_prediction))
            .route("/api/submissions", post(submissions::create_submission))
            .route("/api/submissions/{id}", get(submissions::get_submission))
            .route(WEBHOOK_PATH, post(webhook::replicate_webhook))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        Ok(Self {
            router,
            listen_address,
            orchestrator,
        })
    }

    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Override the configured listen address
    #[must_use]
    pub const fn with_listen_address(mut self, listen_address: SocketAddr) -> Self {
        self.listen_address = listen_address;
        self
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve requests until `shutdown` is cancelled
    ///
    /// Running submissions are cancelled once the listener stops.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        self.orchestrator.shutdown();

        Ok(())
    }
}
