//! Backend API client

use color_eyre::Result;
use gate::Session;
use reqwest::Response;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, instrument};


mod session;

use crate::config;
use crate::model::users::{self, Credentials, PasswordChange, UserList};
use crate::model::{AnalyticsSnapshot, Authenticated, NewAccount, UserProfile, UserRecord};
use crate::store::SessionStore;

const LOGIN: &str = "/login";
const REGISTER: &str = "/register";
const ANALYTICS: &str = "/api/auth/analytics";
const ADMIN_USERS: &str = "/api/admin/users";
const ADMIN_CREATE: &str = "/api/admin/create";
const PROFILE: &str = "/api/user/profile";
const CHANGE_PASSWORD: &str = "/api/user/change-password";

/// Failure of a single API call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("Not logged in")]
    Unauthenticated,
    #[error("Insufficient privileges")]
    Unauthorized,
    #[error("Request could not complete: {0}")]
    NetworkFailure(String),
    #[error("Unexpected response payload: {0}")]
    MalformedResponse(String),
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error(transparent)]
    InvalidInput(#[from] users::Error),
    #[error("Cannot store the session: {0}")]
    Storage(String),
}

impl ErrorKind {
    /// Session related failures are recovered by redirecting to login, not shown as errors
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Unauthorized)
    }
}

impl From<reqwest::Error> for ErrorKind {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::NetworkFailure(err.to_string())
        }
    }
}

/// Error body the backend attaches to refusals
#[derive(Debug, Deserialize)]
struct Message {
    message: String,
}

/// API client bound to the session store
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    store: SessionStore,
}

impl Client {
    pub fn new(config: &config::Api, store: SessionStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            store,
        })
    }

    /// Session store the client reads the credentials from
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Authenticates and replaces the stored session
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ErrorKind> {
        let credentials = Credentials {
            username: username.to_owned(),
            password: password.to_owned(),
        };

        let response = self
            .http
            .post(self.url(LOGIN))
            .json(&credentials)
            .send()
            .await?;
        let session = json::<Authenticated>(response)
            .await?
            .into_session()
            .map_err(|err| ErrorKind::MalformedResponse(err.to_string()))?;

        self.store
            .establish(session.clone())
            .await
            .map_err(|err| ErrorKind::Storage(err.to_string()))?;

        info!(role = %session.role, "Logged in");
        Ok(session)
    }

    /// Creates an account, the stored session is left as it is
    #[instrument(skip(self))]
    pub async fn register(&self, account: &NewAccount) -> Result<(), ErrorKind> {
        let response = self
            .http
            .post(self.url(REGISTER))
            .json(account)
            .send()
            .await?;
        accepted(response).await?;

        info!("Account registered");
        Ok(())
    }

    /// Current security analytics snapshot
    pub async fn analytics(&self) -> Result<AnalyticsSnapshot, ErrorKind> {
        let response = self
            .send_authorized(self.http.get(self.url(ANALYTICS)))
            .await?;
        json(response).await
    }

    /// All the accounts
    pub async fn users(&self) -> Result<Vec<UserRecord>, ErrorKind> {
        let response = self
            .send_authorized(self.http.get(self.url(ADMIN_USERS)))
            .await?;
        let list: UserList = json(response).await?;
        Ok(list.users)
    }

    /// Creates another admin account
    #[instrument(skip(self))]
    pub async fn create_admin(&self, account: &NewAccount) -> Result<(), ErrorKind> {
        let request = self.http.post(self.url(ADMIN_CREATE)).json(account);
        let response = self.send_authorized(request).await?;
        accepted(response).await?;

        info!(username = %account.username, "Admin account created");
        Ok(())
    }

    /// Profile of the logged in user
    pub async fn profile(&self) -> Result<UserProfile, ErrorKind> {
        let response = self
            .send_authorized(self.http.get(self.url(PROFILE)))
            .await?;
        json(response).await
    }

    /// Changes the password of the logged in user
    ///
    /// The form is validated before anything is sent.
    #[instrument(skip(self, change))]
    pub async fn change_password(&self, change: PasswordChange) -> Result<(), ErrorKind> {
        let body = change.validate()?;
        let request = self.http.post(self.url(CHANGE_PASSWORD)).json(&body);
        let response = self.send_authorized(request).await?;
        accepted(response).await?;

        info!("Password changed");
        Ok(())
    }
}

/// Turns non-success responses into `Rejected` errors
async fn accepted(response: Response) -> Result<Response, ErrorKind> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<Message>().await {
        Ok(Message { message }) => message,
        Err(_) => status.canonical_reason().unwrap_or_default().to_owned(),
    };

    debug!(%status, reason = %message, "Request rejected");
    Err(ErrorKind::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Reads the JSON payload of a successful response
///
/// Body that arrives but does not match the expected shape is a `MalformedResponse`.
async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ErrorKind> {
    let response = accepted(response).await?;
    Ok(response.json().await?)
}
