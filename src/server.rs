//! HTTP server for downloading visitor reports.
//!
//! - `GET /health`: liveness and version
//! - `GET /report`: text report as an attachment
//! - `GET /report.csv`: CSV report as an attachment
//!
//! Both report endpoints accept optional `days` and `limit` query parameters.

use crate::config::Config;
use crate::report::{ReportFormat, ReportGenerator, NO_DATA_MESSAGE};
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Default trailing window, in days
    pub window_days: u32,
    /// Default cap on sessions per report
    pub max_records: usize,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        let defaults = Config::default();
        Self {
            port,
            window_days: defaults.report_window_days,
            max_records: defaults.report_max_records,
        }
    }

    pub fn from_config(config: &Config, port: u16) -> Self {
        Self {
            port,
            window_days: config.report_window_days,
            max_records: config.report_max_records,
        }
    }
}

/// Shared server state
pub struct ServerState {
    reports: ReportGenerator,
    window_days: u32,
    max_records: usize,
}

/// Optional report parameters
#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub days: Option<u32>,
    pub limit: Option<usize>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /report
async fn report_text(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<ReportParams>,
) -> Result<Response, ApiError> {
    report(state, params, ReportFormat::Text).await
}

/// GET /report.csv
async fn report_csv(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<ReportParams>,
) -> Result<Response, ApiError> {
    report(state, params, ReportFormat::Csv).await
}

async fn report(
    state: Arc<ServerState>,
    params: ReportParams,
    format: ReportFormat,
) -> Result<Response, ApiError> {
    let now = Utc::now();
    let days = params.days.unwrap_or(state.window_days);
    let limit = params.limit.unwrap_or(state.max_records);

    // The store does file IO
    let rendered = tokio::task::spawn_blocking(move || {
        state.reports.render(format, days, limit, now)
    })
    .await
    .map_err(|e| internal_error(format!("Report task failed: {e}")))?
    .map_err(|e| {
        tracing::error!("Report generation failed: {}", e);
        internal_error(format!("Report generation failed: {e}"))
    })?;

    let Some(content) = rendered else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: NO_DATA_MESSAGE.to_string(),
                code: "NO_DATA".to_string(),
            }),
        ));
    };

    let filename = format!(
        "portfolio_insights_{}.{}",
        now.timestamp_millis(),
        format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        content,
    )
        .into_response())
}

fn internal_error(error: String) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error,
            code: "REPORT_ERROR".to_string(),
        }),
    )
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    reports: ReportGenerator,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState {
        reports,
        window_days: config.window_days,
        max_records: config.max_records,
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/report", get(report_text))
        .route("/report.csv", get(report_csv))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods([Method::GET])
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Report server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
