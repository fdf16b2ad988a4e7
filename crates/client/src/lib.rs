//! `userdesk-client`
//!
//! **Responsibility:** the client side of the user directory API.
//!
//! This crate provides:
//! - A request gateway that attaches the bearer and anti-forgery headers and
//!   tracks anti-forgery token rotation
//! - The sign-in flow feeding the session manager
//! - The user directory controller (filtered/paginated listing, lookup,
//!   role-gated mutations)
//!
//! The API remains the authority on every decision; the client only mirrors
//! enough state to render and gate its views.

pub mod auth;
pub mod config;
pub mod directory;
pub mod dto;
pub mod error;
pub mod gateway;
pub mod xsrf;

use std::sync::Arc;

use userdesk_auth::{CredentialStore, SessionManager};

pub use auth::AuthClient;
pub use config::{ClientConfig, ConfigError};
pub use directory::{DirectoryView, QueryMode, UserDirectory};
pub use error::{ClientError, GatewayError};
pub use gateway::{Credentials, RequestGateway};
pub use xsrf::AntiForgeryStore;

/// Wired-up client: one session shared by the gateway, sign-in flow and directory.
#[derive(Debug)]
pub struct UserDesk {
    pub session: Arc<SessionManager>,
    pub auth: AuthClient,
    pub directory: UserDirectory,
}

impl UserDesk {
    /// Build the client over `store` and resume any persisted session.
    pub fn connect(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ClientError> {
        let session = Arc::new(SessionManager::new(store.clone()));
        session.hydrate(chrono::Utc::now());

        let xsrf = AntiForgeryStore::new(store);
        let gateway = RequestGateway::new(config, session.clone(), xsrf)?;

        Ok(Self {
            session,
            auth: AuthClient::new(gateway.clone()),
            directory: UserDirectory::new(gateway, config.page_size)?,
        })
    }
}
