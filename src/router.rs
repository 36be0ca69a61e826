//! Navigation
//!
//! Four screens. The dashboard and settings screens require a signed-in
//! user; everything else falls through to the login screen.

use serde::Serialize;

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Settings,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Dashboard => "/dashboard",
            Route::Settings => "/settings",
        }
    }

    /// Requires a signed-in user
    pub fn is_guarded(&self) -> bool {
        matches!(self, Route::Dashboard | Route::Settings)
    }

    /// Exact match on a normalized path
    pub fn from_path(path: &str) -> Option<Self> {
        match normalize(path) {
            "/login" => Some(Route::Login),
            "/register" => Some(Route::Register),
            "/dashboard" => Some(Route::Dashboard),
            "/settings" => Some(Route::Settings),
            _ => None,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Strip query, fragment and trailing slashes
fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Outcome of resolving a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Render(Route),
    Redirect(Route),
}

impl Resolution {
    /// The screen that ends up shown
    pub fn route(&self) -> Route {
        match self {
            Resolution::Render(r) | Resolution::Redirect(r) => *r,
        }
    }
}

/// Map a path to a screen, applying the sign-in guard
pub fn resolve(path: &str, signed_in: bool) -> Resolution {
    match Route::from_path(path) {
        Some(route) if route.is_guarded() && !signed_in => Resolution::Redirect(Route::Login),
        Some(route) => Resolution::Render(route),
        None => Resolution::Redirect(Route::Login),
    }
}

/// Current screen plus the session that guards it
pub struct Router {
    session: Session,
    current: Route,
}

impl Router {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            current: Route::Login,
        }
    }

    pub fn current(&self) -> Route {
        self.current
    }

    /// Navigate to `path`, following any redirect
    pub fn navigate(&mut self, path: &str) -> Resolution {
        let resolution = resolve(path, self.session.is_signed_in());
        if let Resolution::Redirect(to) = resolution {
            tracing::debug!(from = path, to = %to, "Redirected");
        }
        self.current = resolution.route();
        resolution
    }

    pub fn go(&mut self, route: Route) -> Resolution {
        self.navigate(route.path())
    }
}
