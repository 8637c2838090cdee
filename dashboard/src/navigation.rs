//! Dashboard navigation
//!
//! Owns the current location. Every move goes through the session gate, and the analytics
//! pipeline is kept running exactly while the admin area is shown.

use gate::{Route, Session, resolve};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::pipeline::{AnalyticsPipeline, PipelineHandle, SnapshotSource};
use crate::store::SessionStore;

pub struct Navigator<S> {
    store: SessionStore,
    session: watch::Receiver<Option<Session>>,
    analytics: AnalyticsPipeline<S>,
    location: Route,
    /// Refresh run of the analytics panel, while mounted
    mounted: Option<PipelineHandle>,
}

impl<S: SnapshotSource> Navigator<S> {
    /// Navigator placed on the login page
    pub fn new(store: SessionStore, analytics: AnalyticsPipeline<S>) -> Self {
        let session = store.subscribe();
        Self {
            store,
            session,
            analytics,
            location: Route::Login,
            mounted: None,
        }
    }

    /// Moves to `target`, or wherever the gate redirects, and returns the final location
    pub async fn navigate(&mut self, target: Route) -> Route {
        let session = self.store.current();
        let resolved = resolve(target, session.as_ref());

        if resolved == target {
            debug!(route = %resolved, "Navigated");
        } else {
            info!(requested = %target, route = %resolved, "Redirected");
        }

        self.location = resolved;
        self.sync_analytics().await;
        resolved
    }

    /// Re-runs the gate for the current location
    pub async fn revalidate(&mut self) -> Route {
        self.navigate(self.location).await
    }

    /// Follows the session until a change moves the navigation elsewhere
    ///
    /// Returns the new location. Changes still permitting the current location are absorbed.
    pub async fn watch_session(&mut self) -> Route {
        loop {
            if self.session.changed().await.is_err() {
                // The navigator holds the store, so the session sender outlives it
                std::future::pending::<()>().await;
            }

            let previous = self.location;
            let current = self.revalidate().await;
            if current != previous {
                return current;
            }
        }
    }

    /// Unmounts everything before the navigator goes away
    pub async fn close(&mut self) {
        if let Some(handle) = self.mounted.take() {
            self.analytics.stop(handle).await;
        }
    }

    async fn sync_analytics(&mut self) {
        let shown = self.location == Route::Admin;
        match self.mounted.take() {
            Some(handle) if shown => self.mounted = Some(handle),
            Some(handle) => self.analytics.stop(handle).await,
            None if shown => self.mounted = Some(self.analytics.start().await),
            None => (),
        }
    }
}

#[cfg(test)]
impl<S: SnapshotSource> Navigator<S> {
    fn location(&self) -> Route {
        self.location
    }

    fn analytics(&self) -> &AnalyticsPipeline<S> {
        &self.analytics
    }

    /// Is the analytics panel refreshing
    fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gate::{Role, Token};

    use super::*;
    use crate::pipeline::tests::{Scripted, snapshot};

    const PERIOD: Duration = Duration::from_secs(30);

    async fn navigator(session: Option<Session>) -> Navigator<Scripted> {
        let store = SessionStore::test().await.unwrap();
        if let Some(session) = session {
            store.establish(session).await.unwrap();
        }

        let source = Scripted::ready(vec![Ok(snapshot(4, Some((52.2, 21.0))))]);
        Navigator::new(store, AnalyticsPipeline::new(source, PERIOD))
    }

    fn admin() -> Session {
        Session::new(Token::new("admin-token"), Role::Admin)
    }

    fn user() -> Session {
        Session::new(Token::new("user-token"), Role::User)
    }

    #[tokio::test]
    async fn starts_on_login() {
        let navigator = navigator(None).await;
        assert_eq!(navigator.location(), Route::Login);
        assert!(!navigator.is_mounted());
    }

    #[tokio::test]
    async fn anonymous_is_sent_to_login() {
        let mut navigator = navigator(None).await;

        assert_eq!(navigator.navigate(Route::Admin).await, Route::Login);
        assert_eq!(navigator.navigate(Route::Dashboard).await, Route::Login);
        assert_eq!(navigator.navigate(Route::Register).await, Route::Register);
        assert!(!navigator.is_mounted());
    }

    #[tokio::test]
    async fn user_is_kept_out_of_admin_area() {
        let mut navigator = navigator(Some(user())).await;

        assert_eq!(navigator.navigate(Route::Admin).await, Route::Dashboard);
        assert_eq!(navigator.location(), Route::Dashboard);
        assert!(!navigator.is_mounted());
        assert!(navigator.analytics().view().snapshot.is_none());
    }

    #[tokio::test]
    async fn admin_area_mounts_analytics() {
        let mut navigator = navigator(Some(admin())).await;
        let mut view = navigator.analytics().subscribe();

        assert_eq!(navigator.navigate(Route::Admin).await, Route::Admin);
        assert!(navigator.is_mounted());

        view.changed().await.unwrap();
        let current = navigator.analytics().view();
        assert_eq!(current.snapshot.unwrap().total_attempts, 4);
        assert!(current.map.is_narrowed());

        // Staying on the page keeps the same run
        assert_eq!(navigator.revalidate().await, Route::Admin);
        assert!(navigator.is_mounted());

        assert_eq!(navigator.navigate(Route::Dashboard).await, Route::Dashboard);
        assert!(!navigator.is_mounted());
    }

    #[tokio::test]
    async fn invalidation_redirects_to_login() {
        let mut navigator = navigator(Some(admin())).await;
        let store = navigator.store.clone();
        navigator.navigate(Route::Admin).await;

        store
            .invalidate(&Token::new("admin-token"), "403 from the API")
            .await;

        assert_eq!(navigator.watch_session().await, Route::Login);
        assert!(!navigator.is_mounted());
    }

    #[tokio::test]
    async fn relogin_with_lower_role_leaves_admin_area() {
        let mut navigator = navigator(Some(admin())).await;
        let store = navigator.store.clone();
        navigator.navigate(Route::Admin).await;

        store.establish(user()).await.unwrap();

        assert_eq!(navigator.watch_session().await, Route::Dashboard);
        assert!(!navigator.is_mounted());
    }

    #[tokio::test]
    async fn close_unmounts() {
        let mut navigator = navigator(Some(admin())).await;
        navigator.navigate(Route::Admin).await;

        navigator.close().await;
        assert!(!navigator.is_mounted());
        assert_eq!(navigator.location(), Route::Admin);
    }
}
