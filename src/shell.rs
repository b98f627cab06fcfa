//! Navigation shell: which view a command lands on, given the session.

use anyhow::{bail, Result};
use std::fmt;
use std::io::{self, Write};

use crate::error::ApiError;
use crate::session::SessionContext;

/// Views reachable from the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    AddRecord,
    List,
    /// Detail view for one or more household ids, as typed.
    Detail(String),
}

impl Route {
    /// Internal views need a session; only the login view is public.
    pub fn requires_session(&self) -> bool {
        !matches!(self, Route::Login)
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/".to_string(),
            Route::Dashboard => "/home".to_string(),
            Route::AddRecord => "/add-user".to_string(),
            Route::List => "/view-users".to_string(),
            Route::Detail(ids) => format!("/user/{}", ids),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Resolves the view actually shown: internal views redirect to login when
/// the session holds no token.
pub fn resolve(requested: Route, session: &SessionContext) -> Route {
    if requested.requires_session() && !session.is_authenticated() {
        Route::Login
    } else {
        requested
    }
}

/// Gate for commands that open `route`; fails with
/// [`ApiError::Unauthenticated`] when redirected to login.
pub fn require(route: Route, session: &SessionContext) -> std::result::Result<Route, ApiError> {
    let shown = resolve(route.clone(), session);
    if shown == route {
        Ok(shown)
    } else {
        Err(ApiError::Unauthenticated)
    }
}

/// Entries offered on the dashboard, in display order.
pub fn dashboard_entries() -> Vec<(Route, &'static str, &'static str)> {
    vec![
        (Route::AddRecord, "census add", "Add a household record"),
        (Route::List, "census list", "Browse and filter family members"),
        (
            Route::Detail("<id>[,<id>...]".to_string()),
            "census show <ids>",
            "View household details",
        ),
    ]
}

/// Asks the operator to confirm `prompt` on stdin.
///
/// `assume_yes` skips the question. Without a terminal on stdin there is no
/// one to ask, so the caller must pass `--yes`.
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !atty::is(atty::Stream::Stdin) {
        bail!("{} Re-run with --yes to confirm non-interactively.", prompt);
    }
    eprint!("{} [y/N] ", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
