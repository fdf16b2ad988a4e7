//! Request gateway: every API call goes through [`RequestGateway::execute`].
//!
//! For each call it
//! 1. attaches `Authorization: Bearer <token>` when signed in (unless the call
//!    is explicitly anonymous, as sign-in is),
//! 2. attaches the current anti-forgery token as `X-XSRF-TOKEN`,
//! 3. captures a rotated anti-forgery token from the response, success or not.
//!
//! Failures propagate unmodified. There is no retry and no backoff.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use userdesk_auth::SessionManager;

use crate::config::ClientConfig;
use crate::dto::ApiErrorBody;
use crate::error::{ClientError, GatewayError};
use crate::xsrf::{AntiForgeryStore, XSRF_HEADER};

/// Whether a call carries the session's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials {
    Session,
    Anonymous,
}

/// Cheap to clone; clones share the session and anti-forgery store.
#[derive(Debug, Clone)]
pub struct RequestGateway {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<SessionManager>,
    xsrf: AntiForgeryStore,
}

impl RequestGateway {
    pub fn new(
        config: &ClientConfig,
        session: Arc<SessionManager>,
        xsrf: AntiForgeryStore,
    ) -> Result<Self, ClientError> {
        let http = config.http_client().map_err(ClientError::Network)?;
        Ok(Self::with_client(http, config.api_url.clone(), session, xsrf))
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        session: Arc<SessionManager>,
        xsrf: AntiForgeryStore,
    ) -> Self {
        Self { http, base_url, session, xsrf }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn anti_forgery(&self) -> &AntiForgeryStore {
        &self.xsrf
    }

    /// Resolve an absolute API path (`/api/...`) against the base URL.
    pub fn url(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| GatewayError::InvalidUrl {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, GatewayError> {
        Ok(self.http.request(method, self.url(path)?))
    }

    /// Send a prepared request with auth and anti-forgery headers attached.
    pub async fn execute(
        &self,
        request: RequestBuilder,
        credentials: Credentials,
    ) -> Result<Response, GatewayError> {
        let mut request = request;

        if credentials == Credentials::Session {
            if let Some(token) = self.session.bearer_token() {
                request = request.bearer_auth(token);
            }
        }
        if let Some(xsrf) = self.xsrf.current() {
            request = request.header(XSRF_HEADER, xsrf);
        }

        let response = request.send().await.map_err(GatewayError::Network)?;
        self.xsrf.capture(response.headers());

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let path = response.url().path().to_string();
        let body = response.text().await.ok().as_deref().and_then(ApiErrorBody::parse);
        tracing::debug!(%status, %path, "API call failed");
        Err(GatewayError::Status { status, body })
    }

    /// `GET` a JSON body with the session's credentials.
    pub async fn get_json<T, Q>(&self, path: &str, query: &Q) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let request = self.request(Method::GET, path)?.query(query);
        let response = self.execute(request, Credentials::Session).await?;
        response.json::<T>().await.map_err(GatewayError::Decode)
    }
}
