//! Application-wide error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use edurelief_core::CoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Wire shape of every error: a stable code plus a human-readable detail.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub detail: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Core(core) => match core {
                CoreError::Validation(_)
                | CoreError::InvalidAmount(_)
                | CoreError::CampaignClosed(_) => StatusCode::BAD_REQUEST,
                CoreError::Unauthorized(_) | CoreError::InvalidCredentials(_) => {
                    StatusCode::UNAUTHORIZED
                }
                CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::DuplicateEmail(_) => StatusCode::CONFLICT,
                CoreError::AuthService(_) | CoreError::Transport(_) => StatusCode::BAD_GATEWAY,
                CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Core(core) => core.code(),
            Self::Database(_) | Self::Migrate(_) => "storage_error",
            Self::Config(_) | Self::PasswordHash(_) => "internal_error",
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Core(CoreError::CampaignClosed(_)) => {
                "This campaign has reached its goal and is no longer active.".to_string()
            }
            Self::Core(core) => core.user_message(),
            // Internal details stay in the logs.
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.code(),
                detail: self.detail(),
            }),
        )
            .into_response()
    }
}

/// Convert a database failure inside a repository into the core taxonomy.
pub fn storage(e: sqlx::Error) -> CoreError {
    CoreError::Storage(e.to_string())
}
