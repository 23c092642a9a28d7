use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rebate_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Produces `{ "error", "code", "retryable" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Malformed request input (bad JSON, unknown enum value, failed field
    /// validation).
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = matches!(&self, AppError::Core(core) if core.is_retryable());

        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    core.code(),
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::InvalidArgument(msg) => {
                    (StatusCode::BAD_REQUEST, core.code(), msg.clone())
                }
                CoreError::InvalidTransition { .. } | CoreError::ConcurrentRunConflict { .. } => {
                    (StatusCode::CONFLICT, core.code(), core.to_string())
                }
                CoreError::Cancelled(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, core.code(), core.to_string())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        core.code(),
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
            "retryable": retryable,
        });

        (status, axum::Json(body)).into_response()
    }
}
