//! Client error taxonomy.
//!
//! The gateway never swallows a failure; callers map [`GatewayError`] into
//! [`ClientError`] and decide whether to surface or only log it.

use reqwest::StatusCode;
use thiserror::Error;

use userdesk_auth::{Denied, InvalidTokenError, SessionError, StoreError};
use userdesk_core::DomainError;

use crate::dto::ApiErrorBody;

/// Transport-level failure of a single call.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request path '{path}': {reason}")]
    InvalidUrl { path: String, reason: String },

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("API error ({status})")]
    Status {
        status: StatusCode,
        body: Option<ApiErrorBody>,
    },

    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad credentials on sign-in.
    #[error("sign-in failed: invalid username or password")]
    AuthenticationFailure,

    /// The API issued a token the client cannot read; treated as signed out.
    #[error("received an unreadable session token: {0}")]
    InvalidToken(#[from] InvalidTokenError),

    /// A role check failed before any request was sent.
    #[error("not permitted: {0}")]
    AuthorizationDenied(#[from] Denied),

    #[error("could not reach the server: {0}")]
    Network(#[source] reqwest::Error),

    #[error("{message}")]
    Server { status: StatusCode, message: String },

    #[error("unexpected response from the server: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Server { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    /// Text suitable for an inline error next to the triggering action.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Server { status, message } => match *status {
                StatusCode::NOT_FOUND => format!("Not found: {message}"),
                StatusCode::UNAUTHORIZED => "Your session has expired; please sign in again.".to_string(),
                StatusCode::FORBIDDEN => format!("The server refused this action: {message}"),
                _ => format!("The server could not complete the request: {message}"),
            },
            ClientError::AuthorizationDenied(denied) => {
                format!("You are not allowed to do this ({denied}).")
            }
            other => other.to_string(),
        }
    }
}

impl From<GatewayError> for ClientError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidUrl { path, reason } => {
                ClientError::Validation(format!("invalid request path '{path}': {reason}"))
            }
            GatewayError::Network(e) => ClientError::Network(e),
            GatewayError::Decode(e) => ClientError::Decode(e),
            GatewayError::Status { status, body } => ClientError::Server {
                status,
                message: body
                    .map(|b| b.describe())
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string()),
            },
        }
    }
}

impl From<DomainError> for ClientError {
    fn from(err: DomainError) -> Self {
        ClientError::Validation(err.to_string())
    }
}

impl From<SessionError> for ClientError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidToken(e) => ClientError::InvalidToken(e),
            SessionError::Store(e) => ClientError::Store(e),
        }
    }
}
