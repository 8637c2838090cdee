//! Dashboard routes and their access requirements

use std::fmt;
use std::str::FromStr;

use crate::{Decision, Error, Session, authorize};

/// Navigable areas of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Admin,
}

/// What a route requires from the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Public,
    Authenticated,
    Admin,
}

impl Route {
    pub fn access(&self) -> Access {
        match self {
            Self::Login | Self::Register => Access::Public,
            Self::Dashboard => Access::Authenticated,
            Self::Admin => Access::Admin,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Dashboard => "/dashboard",
            Self::Admin => "/admin",
        }
    }

    /// All the routes, in the order they are presented to the user
    pub fn all() -> [Route; 4] {
        [Self::Login, Self::Register, Self::Dashboard, Self::Admin]
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.path())
    }
}

impl FromStr for Route {
    type Err = Error;

    /// Parses the route path. Root always lands on the login page.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "/" | "/login" => Ok(Self::Login),
            "/register" => Ok(Self::Register),
            "/dashboard" => Ok(Self::Dashboard),
            "/admin" => Ok(Self::Admin),
            other => Err(Error::UnknownRoute(other.to_owned())),
        }
    }
}

/// Resolves the route the navigation actually ends up on
pub fn resolve(route: Route, session: Option<&Session>) -> Route {
    let decision = match route.access() {
        Access::Public => return route,
        Access::Authenticated => authorize(session, false),
        Access::Admin => authorize(session, true),
    };

    match decision {
        Decision::Allow => route,
        Decision::RedirectLogin => Route::Login,
        Decision::RedirectDashboard => Route::Dashboard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, Token};

    #[test]
    fn public_routes_are_always_reachable() {
        let user = Session::new(Token::new("abc"), Role::User);

        for session in [None, Some(&user)] {
            assert_eq!(resolve(Route::Login, session), Route::Login);
            assert_eq!(resolve(Route::Register, session), Route::Register);
        }
    }

    #[test]
    fn anonymous_lands_on_login() {
        assert_eq!(resolve(Route::Dashboard, None), Route::Login);
        assert_eq!(resolve(Route::Admin, None), Route::Login);
    }

    #[test]
    fn user_is_kept_out_of_admin_area() {
        let user = Session::new(Token::new("abc"), Role::User);

        assert_eq!(resolve(Route::Dashboard, Some(&user)), Route::Dashboard);
        assert_eq!(resolve(Route::Admin, Some(&user)), Route::Dashboard);
    }

    #[test]
    fn admin_reaches_everything() {
        let admin = Session::new(Token::new("abc"), Role::Admin);

        for route in Route::all() {
            assert_eq!(resolve(route, Some(&admin)), route);
        }
    }

    #[test]
    fn parsing_paths() {
        assert_eq!("/".parse::<Route>().unwrap(), Route::Login);
        assert_eq!("/admin".parse::<Route>().unwrap(), Route::Admin);
        for route in Route::all() {
            assert_eq!(route.path().parse::<Route>().unwrap(), route);
        }

        let _ = "/settings".parse::<Route>().unwrap_err();
    }
}
