use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use session_store::SessionStoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("session store error: {0}")]
    SessionStore(#[from] SessionStoreError),

    #[error("kafka error: {0}")]
    Kafka(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            AppError::SessionStore(
                SessionStoreError::SessionNotFound | SessionStoreError::EmptyToken,
            ) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "unauthorized".to_string(),
            ),
            AppError::SessionStore(err) => {
                tracing::error!("session store unavailable: {err}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SESSION_STORE_UNAVAILABLE",
                    "session store unavailable".to_string(),
                )
            }
            AppError::Config(msg) | AppError::Kafka(msg) => {
                tracing::error!("internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
