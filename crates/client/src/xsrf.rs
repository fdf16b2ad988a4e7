//! Anti-forgery token, kept like a root-scoped cookie.
//!
//! The value always reflects the latest token seen on any response and is read
//! fresh before every request. It is never cleared, only overwritten.

use std::sync::Arc;

use reqwest::header::{HeaderMap, SET_COOKIE};

use userdesk_auth::CredentialStore;

/// Request header carrying the token. Responses may also rotate it here.
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";

/// Cookie the API rotates the token through (`Set-Cookie: XSRF-TOKEN=...; Path=/`).
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";

pub const COOKIE_PATH: &str = "/";

#[derive(Debug, Clone)]
pub struct AntiForgeryStore {
    store: Arc<dyn CredentialStore>,
    key: String,
}

impl AntiForgeryStore {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            key: format!("{XSRF_COOKIE};path={COOKIE_PATH}"),
        }
    }

    /// Current token, if any. Read failures count as "no token".
    pub fn current(&self) -> Option<String> {
        match self.store.load(&self.key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read anti-forgery token");
                None
            }
        }
    }

    /// Overwrite the stored token.
    pub fn rotate(&self, value: &str) {
        if let Err(err) = self.store.save(&self.key, value) {
            tracing::error!(error = %err, "failed to persist rotated anti-forgery token");
        }
    }

    /// Pick up a rotated token from response headers. Returns the new value.
    ///
    /// The `XSRF-TOKEN` cookie wins over the `X-XSRF-TOKEN` header; among
    /// several cookies the last non-empty one applies. An emptied cookie
    /// leaves the stored value alone.
    pub fn capture(&self, headers: &HeaderMap) -> Option<String> {
        let rotated = cookie_value(headers).or_else(|| {
            headers
                .get(XSRF_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        })?;

        if self.current().as_deref() != Some(rotated.as_str()) {
            tracing::debug!("anti-forgery token rotated");
            self.rotate(&rotated);
        }
        Some(rotated)
    }
}

fn cookie_value(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| {
            let pair = cookie.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            (name.trim() == XSRF_COOKIE).then(|| value.trim().trim_matches('"').to_string())
        })
        .filter(|value| !value.is_empty())
        .last()
}
