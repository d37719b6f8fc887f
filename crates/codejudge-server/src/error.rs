use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use codejudge_core::ExecutionError;
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Execution(ExecutionError),
}

impl From<ExecutionError> for AppError {
    fn from(err: ExecutionError) -> Self {
        AppError::Execution(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    stage: Option<&'static str>,
}

fn status_for(err: &ExecutionError) -> StatusCode {
    match err {
        ExecutionError::Config(_) | ExecutionError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ExecutionError::UserCodeRuntimeError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ExecutionError::SynthesisFailed(_)
        | ExecutionError::SandboxUnreachable(_)
        | ExecutionError::AdjudicationUnavailable(_)
        | ExecutionError::Persistence(_) => StatusCode::BAD_GATEWAY,
        ExecutionError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ExecutionError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: msg,
                    stage: None,
                },
            ),
            AppError::Execution(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    tracing::warn!("Request failed in {}: {}", err.stage(), err);
                }
                (
                    status,
                    ErrorResponse {
                        error: err.to_string(),
                        stage: Some(err.stage().as_str()),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
