//! Accounts and credentials

use chrono::NaiveDateTime;
use derivative::Derivative;
use gate::{Role, Session, Token};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimal length of a new password
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("New passwords do not match")]
    PasswordMismatch,
    #[error("New password must be at least {MIN_PASSWORD_LENGTH} characters long")]
    PasswordTooShort,
}

/// Successful login response of the credential service
#[derive(Debug, Clone, Deserialize)]
pub struct Authenticated {
    pub token: Token,
    /// Role claim, validated when turned into a session
    pub role: String,
}

impl Authenticated {
    pub fn into_session(self) -> Result<Session, gate::Error> {
        let role: Role = self.role.parse()?;
        Ok(Session::new(self.token, role))
    }
}

/// Login form
#[derive(Derivative, Clone, Serialize)]
#[derivative(Debug)]
pub struct Credentials {
    pub username: String,
    #[derivative(Debug = "ignore")]
    pub password: String,
}

/// Account creation form, both for self-registration and admin creation
#[derive(Derivative, Clone, Serialize)]
#[derivative(Debug)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    #[derivative(Debug = "ignore")]
    pub password: String,
}

/// Password change form, as filled by the user
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct PasswordChange {
    #[derivative(Debug = "ignore")]
    pub current: String,
    #[derivative(Debug = "ignore")]
    pub new: String,
    #[derivative(Debug = "ignore")]
    pub confirm: String,
}

/// Password change body sent to the API
#[derive(Derivative, Clone, Serialize)]
#[derivative(Debug)]
pub struct PasswordChangeRequest {
    #[derivative(Debug = "ignore")]
    current_password: String,
    #[derivative(Debug = "ignore")]
    new_password: String,
}

impl PasswordChange {
    /// Checks the form before anything is sent
    pub fn validate(self) -> Result<PasswordChangeRequest, Error> {
        if self.new != self.confirm {
            return Err(Error::PasswordMismatch);
        }

        if self.new.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::PasswordTooShort);
        }

        Ok(PasswordChangeRequest {
            current_password: self.current,
            new_password: self.new,
        })
    }
}

/// Account as listed in the admin area
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
    pub last_login: Option<NaiveDateTime>,
}

/// Admin users listing envelope
#[derive(Debug, Clone, Deserialize)]
pub struct UserList {
    pub users: Vec<UserRecord>,
}

/// Profile of the logged in user
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: NaiveDateTime,
    pub last_login: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    fn change(new: &str, confirm: &str) -> PasswordChange {
        PasswordChange {
            current: "old-password".to_owned(),
            new: new.to_owned(),
            confirm: confirm.to_owned(),
        }
    }

    #[test]
    fn password_change_validation() {
        assert_eq!(
            change("new-password", "new-passwort").validate().unwrap_err(),
            Error::PasswordMismatch
        );
        assert_eq!(
            change("short", "short").validate().unwrap_err(),
            Error::PasswordTooShort
        );

        let request = change("new-password", "new-password").validate().unwrap();
        assert_json_eq!(
            serde_json::to_value(request).unwrap(),
            json!({
                "current_password": "old-password",
                "new_password": "new-password"
            })
        );
    }

    #[test]
    fn login_response_into_session() {
        let response: Authenticated =
            serde_json::from_value(json!({ "token": "abc", "role": "admin" })).unwrap();
        let session = response.into_session().unwrap();
        assert_eq!(session.role, Role::Admin);
        assert_eq!(session.token.expose(), "abc");

        let response: Authenticated =
            serde_json::from_value(json!({ "token": "abc", "role": "root" })).unwrap();
        let _ = response.into_session().unwrap_err();
    }

    #[test]
    fn secrets_stay_out_of_debug() {
        let account = NewAccount {
            username: "admin2".to_owned(),
            email: "admin2@example.com".to_owned(),
            password: "hunter22".to_owned(),
        };
        let debug = format!("{account:?}");
        assert!(!debug.contains("hunter22"), "{debug}");

        let debug = format!("{:?}", change("new-password", "new-password"));
        assert!(!debug.contains("new-password"), "{debug}");
    }

    #[test]
    fn users_listing() {
        let users: UserList = serde_json::from_value(json!({
            "users": [
                {
                    "id": 1,
                    "username": "admin",
                    "email": "admin@example.com",
                    "is_admin": true,
                    "created_at": "2024-01-01T00:00:00",
                    "last_login": "2024-05-01T12:30:45.5"
                },
                {
                    "id": 2,
                    "username": "jane",
                    "email": "jane@example.com",
                    "is_admin": false,
                    "created_at": "2024-02-01T10:00:00",
                    "last_login": null
                }
            ]
        }))
        .unwrap();

        assert_eq!(users.users.len(), 2);
        assert!(users.users[0].is_admin);
        assert!(users.users[0].last_login.is_some());
        assert_eq!(users.users[1].last_login, None);
    }
}
