//! Session lifecycle: hydrate at startup, replace on login, clear on logout.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;

use crate::codec::{InvalidTokenError, decode_claims};
use crate::store::{CredentialStore, StoreError};
use crate::{Role, validate_claims};

/// Storage key of the persisted bearer token.
pub const TOKEN_KEY: &str = "token";

/// Current authentication state.
///
/// Invariant: `roles` is non-empty only when a token is present. The only
/// constructors are [`Session::anonymous`] and the session manager, so the
/// invariant cannot be broken from outside this module.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    roles: BTreeSet<Role>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    fn authenticated(token: String, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            token: Some(token),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    /// Raw membership test. Gating decisions go through [`crate::guard`].
    pub(crate) fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("roles", &self.roles)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    InvalidToken(#[from] InvalidTokenError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owner of the session state.
///
/// Shared by `Arc`; every other component reads a [`Session`] snapshot.
/// Mutation happens only through [`login`](Self::login),
/// [`logout`](Self::logout) and [`hydrate`](Self::hydrate), each a single
/// write-lock critical section.
#[derive(Debug)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    state: RwLock<Session>,
}

impl SessionManager {
    /// Create a manager with an absent session. Call [`hydrate`](Self::hydrate)
    /// once at startup to resume a persisted one.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            state: RwLock::new(Session::anonymous()),
        }
    }

    /// Resume the persisted session, if any.
    ///
    /// A token that no longer decodes or has expired is discarded (and removed
    /// from storage); the session is then absent. Never fails.
    pub fn hydrate(&self, now: DateTime<Utc>) -> Session {
        let token = match self.store.load(TOKEN_KEY) {
            Ok(Some(token)) => token,
            Ok(None) => return self.replace(Session::anonymous()),
            Err(err) => {
                tracing::error!(error = %err, "failed to read persisted token; starting signed out");
                return self.replace(Session::anonymous());
            }
        };

        match session_from_token(token, now) {
            Ok(session) => {
                tracing::info!(roles = session.roles.len(), "resumed persisted session");
                self.replace(session)
            }
            Err(err) => {
                tracing::warn!(error = %err, "discarding persisted token");
                if let Err(err) = self.store.remove(TOKEN_KEY) {
                    tracing::error!(error = %err, "failed to remove invalid persisted token");
                }
                self.replace(Session::anonymous())
            }
        }
    }

    /// Establish a session from a freshly issued token.
    ///
    /// On any error the previous session is left exactly as it was.
    pub fn login(&self, token: impl Into<String>, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let session = session_from_token(token.into(), now)?;

        let mut state = self.state.write();
        if let Some(token) = session.token() {
            self.store.save(TOKEN_KEY, token)?;
        }
        *state = session.clone();
        drop(state);

        tracing::info!(
            roles = ?session.roles.iter().map(Role::as_str).collect::<Vec<_>>(),
            "signed in"
        );
        Ok(session)
    }

    /// Clear the session.
    ///
    /// The in-memory session is always cleared; a failure to remove the
    /// persisted token is still reported.
    pub fn logout(&self) -> Result<(), StoreError> {
        let mut state = self.state.write();
        *state = Session::anonymous();
        let removed = self.store.remove(TOKEN_KEY);
        drop(state);

        tracing::info!("signed out");
        removed
    }

    pub fn snapshot(&self) -> Session {
        self.state.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_authenticated()
    }

    /// Current bearer token, if signed in.
    pub fn bearer_token(&self) -> Option<String> {
        self.state.read().token.clone()
    }

    fn replace(&self, session: Session) -> Session {
        *self.state.write() = session.clone();
        session
    }
}

fn session_from_token(token: String, now: DateTime<Utc>) -> Result<Session, InvalidTokenError> {
    let claims = decode_claims(&token)?;
    validate_claims(&claims, now)?;
    Ok(Session::authenticated(token.trim().to_string(), claims.authorities))
}
