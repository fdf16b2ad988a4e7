//! Sign-in and sign-out.

use chrono::Utc;
use reqwest::{Method, StatusCode};

use userdesk_auth::Session;

use crate::dto::{LoginRequest, LoginResponse};
use crate::error::{ClientError, GatewayError};
use crate::gateway::{Credentials, RequestGateway};

pub const AUTHENTICATE_PATH: &str = "/api/auth/authenticate";

#[derive(Debug, Clone)]
pub struct AuthClient {
    gateway: RequestGateway,
}

impl AuthClient {
    pub fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    /// Exchange credentials for a token and start a session.
    ///
    /// The call is always sent without a bearer token. On rejection the
    /// current session is left untouched.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Session, ClientError> {
        let request = self
            .gateway
            .request(Method::POST, AUTHENTICATE_PATH)?
            .json(&LoginRequest { username, password });

        let response = match self.gateway.execute(request, Credentials::Anonymous).await {
            Ok(response) => response,
            Err(GatewayError::Status { status, .. })
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                tracing::info!(username, %status, "sign-in rejected");
                return Err(ClientError::AuthenticationFailure);
            }
            Err(err) => return Err(err.into()),
        };

        let LoginResponse { token } = response.json().await.map_err(ClientError::Decode)?;
        tracing::debug!(username, "credentials accepted");
        Ok(self.gateway.session().login(token, Utc::now())?)
    }

    /// Forget the token. The anti-forgery token is kept.
    pub fn sign_out(&self) -> Result<(), ClientError> {
        Ok(self.gateway.session().logout()?)
    }

    pub fn session(&self) -> Session {
        self.gateway.session().snapshot()
    }
}
