//! Session gate
//!
//! Pure access decisions for dashboard navigation. Nothing in this crate performs any I/O - the
//! caller provides the session it currently believes in, and gets back what should happen with
//! the navigation.

use std::fmt;
use std::str::FromStr;

use derivative::Derivative;
use serde::Deserialize;
use thiserror::Error;

mod route;

pub use route::{Access, Route, resolve};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Unknown role claim: {0}")]
    UnknownRole(String),
    #[error("Unknown route: {0}")]
    UnknownRoute(String),
}

/// Role claim issued by the credential service together with the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(Error::UnknownRole(other.to_owned())),
        }
    }
}

/// Opaque bearer credential
///
/// The value is never verified on the client side, it is only carried to the API. `Debug` output
/// is redacted so the token never ends up in the logs.
#[derive(Derivative, Clone, PartialEq, Eq, Deserialize)]
#[derivative(Debug)]
#[serde(transparent)]
pub struct Token(#[derivative(Debug(format_with = "redacted"))] String);

fn redacted(_: &String, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("<redacted>")
}

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value, to be used only for the `Authorization` header and persistence
    pub fn expose(&self) -> &str {
        &self.0
    }
}

/// Cached belief about who is logged in
///
/// The token and the role always travel together - there is no way to build a session with a
/// token and without a role, and "logged out" is represented by the absence of a session. Any
/// change of the session replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: Token,
    pub role: Role,
}

impl Session {
    pub fn new(token: Token, role: Role) -> Self {
        Self { token, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Outcome of the gate check for a single navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Allow,
    RedirectLogin,
    RedirectDashboard,
}

/// Decides whether the navigation may proceed
///
/// Missing session always sends the caller to the login page, no matter what the route requires.
/// Authenticated non-admins asking for an admin-only area are sent back to their dashboard.
pub fn authorize(session: Option<&Session>, require_admin: bool) -> Decision {
    match session {
        None => Decision::RedirectLogin,
        Some(session) if require_admin && !session.is_admin() => Decision::RedirectDashboard,
        Some(_) => Decision::Allow,
    }
}
