//! Core error taxonomy shared by the session manager, policy, engine and client.
//!
//! Every variant has a stable wire code so the backend can report a typed
//! outcome and the client can map it back without string matching on messages.

use thiserror::Error;

use crate::types::CampaignId;

const GENERIC_AUTH_MESSAGE: &str = "Authentication service unavailable. Please try again.";
const GENERIC_TRANSPORT_MESSAGE: &str = "Could not reach the server. Please retry.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    DuplicateEmail(String),

    #[error("Campaign {0} has reached its goal and is no longer active")]
    CampaignClosed(CampaignId),

    #[error("Invalid donation amount: {0}")]
    InvalidAmount(String),

    #[error("Campaign {0} not found")]
    NotFound(CampaignId),

    /// The identity endpoint answered with an error. Holds the server's
    /// message when it supplied one.
    #[error("Authentication service error: {}", .0.as_deref().unwrap_or(GENERIC_AUTH_MESSAGE))]
    AuthService(Option<String>),

    /// No usable response. Callers must not assume any state changed.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Stable identifier used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Forbidden(_) => "forbidden",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidCredentials(_) => "invalid_credentials",
            Self::DuplicateEmail(_) => "duplicate_email",
            Self::CampaignClosed(_) => "campaign_closed",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::NotFound(_) => "not_found",
            Self::AuthService(_) => "auth_service_error",
            Self::Transport(_) => "transport_error",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Rebuild a typed error from an API error body.
    ///
    /// `detail` is the human-readable message; for campaign-scoped codes it is
    /// interpreted as the campaign id when `resource` is not supplied.
    pub fn from_code(code: &str, detail: String, resource: Option<CampaignId>) -> Self {
        match code {
            "validation_error" => Self::Validation(detail),
            "forbidden" => Self::Forbidden(detail),
            "unauthorized" => Self::Unauthorized(detail),
            "invalid_credentials" => Self::InvalidCredentials(detail),
            "duplicate_email" => Self::DuplicateEmail(detail),
            "campaign_closed" => Self::CampaignClosed(resource.unwrap_or(detail)),
            "invalid_amount" => Self::InvalidAmount(detail),
            "not_found" => Self::NotFound(resource.unwrap_or(detail)),
            // The server failed on its side; retrying may succeed.
            "transport_error" | "internal_error" => Self::Transport(detail),
            "storage_error" => Self::Storage(detail),
            _ => Self::AuthService(Some(detail).filter(|d| !d.is_empty())),
        }
    }

    /// Text suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials(msg) | Self::DuplicateEmail(msg) => msg.clone(),
            Self::AuthService(msg) => msg
                .clone()
                .unwrap_or_else(|| GENERIC_AUTH_MESSAGE.to_string()),
            Self::Transport(_) => GENERIC_TRANSPORT_MESSAGE.to_string(),
            Self::Unauthorized(_) => {
                "Invalid session or token expired. Please log out and log in again.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// `true` when retrying the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
