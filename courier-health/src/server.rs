//! Health and control HTTP server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use courier_common::Signal;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::{HealthChecker, HealthConfig, HealthError};

/// Serves the probe, status and trigger endpoints
pub struct HealthServer {
    listener: TcpListener,
    router: Router,
}

impl HealthServer {
    /// Bind the configured address
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn new(
        config: &HealthConfig,
        checker: Arc<HealthChecker>,
    ) -> Result<Self, HealthError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| HealthError::BindError {
                address: config.listen_address.clone(),
                source: e,
            })?;

        tracing::info!(
            address = %config.listen_address,
            "Health server bound successfully"
        );

        Ok(Self {
            listener,
            router: router(checker),
        })
    }

    /// Address actually bound, useful when the configured port is 0
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, HealthError> {
        self.listener
            .local_addr()
            .map_err(|e| HealthError::ServerError(e.to_string()))
    }

    /// Run until a shutdown signal is received
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a runtime error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), HealthError> {
        tracing::info!("Health server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Health server received shutdown signal");
            })
            .await
            .map_err(|e| HealthError::ServerError(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

fn router(checker: Arc<HealthChecker>) -> Router {
    Router::new()
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/status", get(status_handler))
        .route("/dispatch", post(dispatch_handler))
        .with_state(checker)
        .layer(TimeoutLayer::new(Duration::from_secs(1)))
}

async fn liveness_handler(State(checker): State<Arc<HealthChecker>>) -> Response {
    if checker.is_alive() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
    }
}

/// Failing readiness takes the instance out of rotation; the body carries
/// the status so the cause is visible in probe logs.
async fn readiness_handler(State(checker): State<Arc<HealthChecker>>) -> Response {
    if checker.is_ready() {
        (StatusCode::OK, "OK").into_response()
    } else {
        let status = checker.status();
        tracing::warn!(
            serving = status.serving,
            store_reachable = ?status.store_reachable,
            last_error = ?status.last_error,
            "Readiness probe failed"
        );
        (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response()
    }
}

async fn status_handler(State(checker): State<Arc<HealthChecker>>) -> Response {
    (StatusCode::OK, Json(checker.status())).into_response()
}

async fn dispatch_handler(State(checker): State<Arc<HealthChecker>>) -> Response {
    if checker.trigger() {
        tracing::info!("Dispatch cycle triggered manually");
        (StatusCode::ACCEPTED, "Dispatch cycle started").into_response()
    } else {
        (StatusCode::CONFLICT, "Dispatch cycle already running").into_response()
    }
}
