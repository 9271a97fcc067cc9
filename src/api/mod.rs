//! HTTP API for health checks and command execution

use crate::commands::{CommandOutput, CommandRegistry, RawRequest};
use crate::config::ApiConfig;
use crate::context::RequestContext;
use crate::error::{ErrorCategory, SubmitterError, SubmitterResult};
use crate::metrics;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CommandRegistry>,
    /// Deadline applied to every command
    pub request_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ovm/:command", post(run_command))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP API server until `shutdown` fires
pub async fn run_server(
    config: ApiConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> SubmitterResult<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SubmitterError::Config(format!("Cannot bind API server on {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| SubmitterError::Config(format!("API server failed: {}", e)))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Dropping this future (client disconnect) drops any in-flight ledger call
async fn run_command(
    State(state): State<AppState>,
    Path(command): Path<String>,
    Json(raw): Json<RawRequest>,
) -> Result<Json<CommandOutput>, ApiError> {
    let ctx = RequestContext::new(state.request_timeout);

    match state.registry.dispatch_raw(&ctx, &command, raw).await {
        Ok(output) => Ok(Json(output)),
        Err(e) => {
            warn!(request_id = %ctx.request_id(), command = %command, error = %e, "Command failed");
            metrics::record_request_error(e.category());
            Err(ApiError(e))
        }
    }
}

/// Structured error body: `{"error": {"category", "field", "message"}}`
pub struct ApiError(pub SubmitterError);

impl ApiError {
    fn status(&self) -> StatusCode {
        if matches!(self.0, SubmitterError::UnknownCommand(_)) {
            return StatusCode::NOT_FOUND;
        }
        match self.0.category() {
            ErrorCategory::InputValidation => StatusCode::BAD_REQUEST,
            ErrorCategory::IdentityResolution => StatusCode::NOT_FOUND,
            ErrorCategory::NetworkFailure => StatusCode::BAD_GATEWAY,
            ErrorCategory::ChainRejection => StatusCode::CONFLICT,
            ErrorCategory::ConfirmationTimeout => StatusCode::GATEWAY_TIMEOUT,
            // client closed request
            ErrorCategory::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT)
            }
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                category: self.0.category().as_str(),
                field: self.0.field(),
                message: self.0.to_string(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    category: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
    message: String,
}
