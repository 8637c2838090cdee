//! Session-carrying requests
//!
//! Every authenticated call goes through here. A refusal from the API (401/403) is the session
//! invalidation signal: the stored session is dropped, so the next gate check redirects to the
//! login page.

use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::{Client, ErrorKind};

impl Client {
    /// Sends the request with the bearer token of the current session
    pub(super) async fn send_authorized(
        &self,
        request: RequestBuilder,
    ) -> Result<Response, ErrorKind> {
        let Some(session) = self.store.current() else {
            debug!("No session, request not sent");
            return Err(ErrorKind::Unauthenticated);
        };

        let response = request.bearer_auth(session.token.expose()).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                self.store
                    .invalidate(&session.token, "API refused the session token")
                    .await;
                Err(ErrorKind::Unauthenticated)
            }
            StatusCode::FORBIDDEN => {
                self.store
                    .invalidate(&session.token, "API refused access for the session role")
                    .await;
                Err(ErrorKind::Unauthorized)
            }
            _ => Ok(response),
        }
    }
}
