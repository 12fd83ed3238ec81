use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Session expired")]
    SessionExpired,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    InternalServerError,
}

impl AppError {
    /// Fixed user-facing strings keyed by upstream status code, with a
    /// generic fallback. Shown as-is by the UI shell.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => "Could not reach the server. Check your connection.".to_string(),
            AppError::Api { status, .. } => match status {
                400 => "The server rejected the request.".to_string(),
                401 => "Your session has expired. Please log in again.".to_string(),
                403 => "You do not have permission to do that.".to_string(),
                404 => "The requested item no longer exists.".to_string(),
                500..=599 => "The server is having trouble. Try again later.".to_string(),
                _ => "Something went wrong. Please try again.".to_string(),
            },
            AppError::SessionExpired => "Your session has expired. Please log in again.".to_string(),
            AppError::NotLoggedIn => "Please log in first.".to_string(),
            AppError::NotFound => "The requested item no longer exists.".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.user_message()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::SessionExpired | AppError::NotLoggedIn => {
                (StatusCode::UNAUTHORIZED, self.user_message())
            }
            AppError::Api { status, message } => {
                error!("backend error {}: {}", status, message);
                let code = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
                (code, self.user_message())
            }
            AppError::Network(e) => {
                error!("network error: {}", e);
                (StatusCode::BAD_GATEWAY, self.user_message())
            }
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}
