use crate::config::ServerConfig;
use crate::data::{ScheduleRequest, SearchOutcome};
use crate::error::ScheduleError;
use crate::solver;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::post};
use log::{error, info, warn};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct AppState {
    config: Arc<ServerConfig>,
}

/// Error body returned to HTTP callers.
#[derive(Debug)]
struct ApiError(StatusCode, String);

impl From<ScheduleError> for ApiError {
    fn from(err: ScheduleError) -> Self {
        if err.is_input_error() {
            ApiError(StatusCode::BAD_REQUEST, err.to_string())
        } else {
            ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

async fn generate_handler(
    State(state): State<AppState>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SearchOutcome>), ApiError> {
    let Json(mut request) = payload.map_err(|rejection| {
        warn!("Rejected request body: {rejection}");
        ApiError(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;
    request.budget = Some(state.config.effective_budget(request.budget));

    let outcome = tokio::task::spawn_blocking(move || solver::generate(&request))
        .await
        .map_err(|join_err| {
            error!("Search task failed: {join_err}");
            ScheduleError::Internal(join_err.to_string())
        })??;

    let status = if outcome.reason.is_some() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

pub fn router(config: ServerConfig) -> Router {
    Router::new()
        .route("/v1/schedule/generate", post(generate_handler))
        .with_state(AppState {
            config: Arc::new(config),
        })
}

pub async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, router(config)).await
}
