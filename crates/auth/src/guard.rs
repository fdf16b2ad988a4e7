//! Access guard: the single place role membership is checked.
//!
//! The role check is only reachable through the proof returned by
//! [`require_authenticated`], so a role check on a signed-out session cannot
//! be expressed.
//!
//! - No IO
//! - No panics

use serde::Serialize;
use thiserror::Error;

use crate::{Role, Route, Session};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Denied {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: missing role '{0}'")]
    MissingRole(Role),
}

impl Denied {
    /// Where navigation should go instead of the protected view.
    pub fn redirect(&self) -> Route {
        match self {
            Denied::Unauthenticated => Route::SignIn,
            Denied::MissingRole(_) => Route::Home,
        }
    }
}

/// Proof that a session carries a token.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated<'a> {
    session: &'a Session,
}

/// Outer guard: redirect to sign-in when there is no token.
pub fn require_authenticated(session: &Session) -> Result<Authenticated<'_>, Denied> {
    if session.is_authenticated() {
        Ok(Authenticated { session })
    } else {
        Err(Denied::Unauthenticated)
    }
}

impl<'a> Authenticated<'a> {
    /// Inner guard: redirect to the landing page when `role` is missing,
    /// whatever other roles are present.
    pub fn require_role(self, role: &Role) -> Result<Self, Denied> {
        if self.session.has_role(role) {
            Ok(self)
        } else {
            Err(Denied::MissingRole(role.clone()))
        }
    }

    pub fn session(&self) -> &'a Session {
        self.session
    }

    /// Run the protected view. Only reachable once every guard passed.
    pub fn render<T>(self, view: impl FnOnce(&Session) -> T) -> T {
        view(self.session)
    }
}

/// What a protected view requires. `Role` implies `Authenticated` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    Role(Role),
}

/// Evaluate the nested guards for `requirement`, running `view` only when
/// all of them pass.
pub fn guarded<T>(
    session: &Session,
    requirement: &Requirement,
    view: impl FnOnce(&Session) -> T,
) -> Result<T, Denied> {
    match requirement {
        Requirement::Public => Ok(view(session)),
        Requirement::Authenticated => Ok(require_authenticated(session)?.render(view)),
        Requirement::Role(role) => Ok(require_authenticated(session)?.require_role(role)?.render(view)),
    }
}

/// Role-gated actions offered on the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Upload,
}

impl Action {
    pub const ALL: [Action; 5] = [Action::View, Action::Create, Action::Edit, Action::Delete, Action::Upload];

    pub fn required_role(&self) -> Role {
        match self {
            Action::View => Role::GET_USERS,
            Action::Create | Action::Upload => Role::POST_USERS,
            Action::Edit => Role::PUT_USERS,
            Action::Delete => Role::DELETE_USERS,
        }
    }

    pub fn requirement(&self) -> Requirement {
        Requirement::Role(self.required_role())
    }

    /// Check whether `session` may perform this action.
    pub fn authorize(&self, session: &Session) -> Result<(), Denied> {
        guarded(session, &self.requirement(), |_| ())
    }
}

/// Which action affordances to show for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Affordances {
    pub view: bool,
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
    pub upload: bool,
}

impl Affordances {
    pub fn for_session(session: &Session) -> Self {
        let allowed = |action: Action| action.authorize(session).is_ok();
        Self {
            view: allowed(Action::View),
            create: allowed(Action::Create),
            edit: allowed(Action::Edit),
            delete: allowed(Action::Delete),
            upload: allowed(Action::Upload),
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::View => self.view,
            Action::Create => self.create,
            Action::Edit => self.edit,
            Action::Delete => self.delete,
            Action::Upload => self.upload,
        }
    }
}
