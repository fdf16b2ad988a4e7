//! Client route table and navigation gating.

use serde::Serialize;

use crate::guard::{Requirement, guarded};
use crate::{Role, Session};

/// Client-side routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// `/login` (public sign-in entry point).
    SignIn,
    /// `/home`, the default authenticated landing page.
    Home,
    /// `/admin`, bulk upload; requires `POST_USERS`.
    Admin,
    /// `/`, redirects depending on authentication.
    Root,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::SignIn => "/login",
            Route::Home => "/home",
            Route::Admin => "/admin",
            Route::Root => "/",
        }
    }

    /// Unknown paths map to `None`.
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        match normalized {
            "/login" => Some(Route::SignIn),
            "/home" => Some(Route::Home),
            "/admin" => Some(Route::Admin),
            "/" => Some(Route::Root),
            _ => None,
        }
    }

    pub fn requirement(&self) -> Requirement {
        match self {
            Route::SignIn | Route::Root => Requirement::Public,
            Route::Home => Requirement::Authenticated,
            Route::Admin => Requirement::Role(Role::POST_USERS),
        }
    }
}

impl core::fmt::Display for Route {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of one navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "route", rename_all = "snake_case")]
pub enum Navigation {
    Render(Route),
    Redirect(Route),
}

impl Navigation {
    /// Resolve one navigation step for `path`.
    ///
    /// Unknown paths behave like `/`.
    pub fn resolve(path: &str, session: &Session) -> Self {
        let route = Route::from_path(path).unwrap_or(Route::Root);
        if route == Route::Root {
            return if session.is_authenticated() {
                Navigation::Redirect(Route::Home)
            } else {
                Navigation::Redirect(Route::SignIn)
            };
        }

        match guarded(session, &route.requirement(), |_| route) {
            Ok(route) => Navigation::Render(route),
            Err(denied) => Navigation::Redirect(denied.redirect()),
        }
    }

    /// Follow redirects until a route renders.
    pub fn settle(path: &str, session: &Session) -> Route {
        let mut step = Self::resolve(path, session);
        // Every redirect target is either public or satisfied by the guard
        // that produced it, so this terminates within two hops.
        for _ in 0..4 {
            match step {
                Navigation::Render(route) => return route,
                Navigation::Redirect(next) => step = Self::resolve(next.path(), session),
            }
        }
        Route::SignIn
    }
}

/// One entry of the navigation menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub label: &'static str,
    pub route: Route,
}

impl MenuEntry {
    /// Menu entries visible to `session`. Empty when signed out.
    pub fn visible_to(session: &Session) -> Vec<MenuEntry> {
        let candidates = [
            MenuEntry { label: "Home", route: Route::Home },
            MenuEntry { label: "Admin", route: Route::Admin },
        ];
        candidates
            .into_iter()
            .filter(|entry| guarded(session, &entry.route.requirement(), |_| ()).is_ok())
            .collect()
    }
}
