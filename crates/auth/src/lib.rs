//! `userdesk-auth` — client-side session and authorization model.
//!
//! This crate is intentionally decoupled from HTTP. It decodes bearer tokens
//! without verifying them (the API re-validates every call), owns the session
//! lifecycle, and centralizes every role check behind the access guard.

pub mod claims;
pub mod codec;
pub mod guard;
pub mod roles;
pub mod routes;
pub mod session;
pub mod store;

pub use claims::{TokenClaims, TokenValidationError, validate_claims};
pub use codec::{InvalidTokenError, decode_claims};
pub use guard::{Action, Affordances, Authenticated, Denied, Requirement, guarded, require_authenticated};
pub use roles::Role;
pub use routes::{MenuEntry, Navigation, Route};
pub use session::{Session, SessionError, SessionManager, TOKEN_KEY};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError};
