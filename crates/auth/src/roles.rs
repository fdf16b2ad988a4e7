use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Authority granted to a session (carried in the token's `authorities` claim).
///
/// Roles are opaque strings; the ones the directory API understands are
/// provided as constants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Read user records.
    pub const GET_USERS: Role = Role::from_static("GET_USERS");
    /// Create users and upload CSV batches.
    pub const POST_USERS: Role = Role::from_static("POST_USERS");
    /// Edit existing users.
    pub const PUT_USERS: Role = Role::from_static("PUT_USERS");
    pub const DELETE_USERS: Role = Role::from_static("DELETE_USERS");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
