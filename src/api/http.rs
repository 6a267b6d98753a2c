use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::blockchain::{MonitorHandle, MonitorStatus};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Metrics encoding failed: {0}")]
    Encoding(#[from] prometheus::Error),
    #[error("Server error: {0}")]
    Server(String),
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub monitor: Option<MonitorHandle>,
}

/// Prometheus exporter for the deposit metrics
pub struct MetricsServer {
    state: AppState,
    pub host: String,
    pub port: u16,
}

impl MetricsServer {
    pub fn new(registry: Registry, host: impl Into<String>, port: u16) -> Self {
        Self {
            state: AppState { registry, monitor: None },
            host: host.into(),
            port,
        }
    }

    /// Also serve the monitor status on `/status`
    pub fn with_monitor(mut self, monitor: MonitorHandle) -> Self {
        self.state.monitor = Some(monitor);
        self
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> Result<(), ApiError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();

        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("Metrics server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ApiError::Server(format!("Server error: {}", e)))?;

        log::info!("Metrics server stopped");
        Ok(())
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/health", get(get_health))
        .route("/status", get(get_status))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

/// Text exposition of every registered series
pub fn encode_metrics(registry: &Registry) -> Result<(String, Vec<u8>), ApiError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}

/// GET /metrics
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    match encode_metrics(&state.registry) {
        Ok((content_type, body)) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "encoding_error".to_string(),
                    message: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health
pub async fn get_health() -> &'static str {
    "ok"
}

/// GET /status
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<MonitorStatus>, (StatusCode, Json<ErrorResponse>)> {
    match state.monitor {
        Some(monitor) => Ok(Json(monitor.status())),
        None => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "monitor_unavailable".to_string(),
                message: "No deposit monitor is attached to this server".to_string(),
            }),
        )),
    }
}
