//! Wire shapes of the authentication endpoint and API error bodies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Error body returned by the API (`{ message, details }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl ApiErrorBody {
    /// Parse an error body; plain-text bodies become the message.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        serde_json::from_str(raw).ok().or_else(|| {
            Some(Self {
                message: raw.to_string(),
                details: None,
            })
        })
    }

    pub fn describe(&self) -> String {
        match &self.details {
            Some(details) if !details.is_empty() && details != &self.message => {
                format!("{}: {}", self.message, details)
            }
            _ => self.message.clone(),
        }
    }
}
