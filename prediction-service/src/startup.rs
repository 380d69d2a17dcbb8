//! Application startup and lifecycle management.

use crate::config::{Manifest, PredictionConfig};
use crate::handlers;
use crate::models::ModelRegistry;
use crate::schema::TransformRegistry;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use serving_core::error::AppError;
use serving_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
}

/// Assemble the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/models", get(handlers::list_models))
        .route("/:model_id/predict", post(handlers::predict))
        .route("/:model_id/predict/", post(handlers::predict))
        .route("/:model_id/predict_proba", post(handlers::predict_proba))
        .route("/:model_id/predict_proba/", post(handlers::predict_proba))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Load the manifest and every model it declares.
pub fn load_registry(
    config: &PredictionConfig,
    transforms: &TransformRegistry,
) -> Result<ModelRegistry, AppError> {
    let manifest = Manifest::load(&config.manifest_path).map_err(|e| {
        tracing::error!(
            "Failed to load manifest {}: {}",
            config.manifest_path.display(),
            e
        );
        e
    })?;

    let registry =
        ModelRegistry::from_manifest(&manifest, &config.manifest_dir(), transforms).map_err(
            |e| {
                tracing::error!("Failed to build models: {}", e);
                e
            },
        )?;

    Ok(registry)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the built-in transforms.
    pub async fn build(config: PredictionConfig) -> Result<Self, AppError> {
        Self::build_with_transforms(config, &TransformRegistry::builtin()).await
    }

    /// Build the application, resolving manifest transforms from `transforms`.
    pub async fn build_with_transforms(
        config: PredictionConfig,
        transforms: &TransformRegistry,
    ) -> Result<Self, AppError> {
        let registry = load_registry(&config, transforms)?;
        tracing::info!(models = registry.len(), "Model registry ready");

        let state = AppState {
            registry: Arc::new(registry),
        };

        // Port 0 picks a random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, router(self.state)).await
    }

    /// Serve until `signal` resolves, then drain in-flight requests.
    pub async fn run_with_graceful_shutdown<F>(self, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(signal)
            .await
    }
}
