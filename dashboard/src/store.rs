//! Client-side session store
//!
//! Keeps the cached belief about who is logged in. The session is persisted in SQLite so it
//! survives restarts, and published through a `watch` channel so anyone interested (navigation,
//! the analytics panel) is notified about every change. The store is never a hidden global - it is
//! created once and handed to everyone who needs it.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use color_eyre::Result;
use gate::{Decision, Role, Session, Token, authorize};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::config;

const TOKEN_KEY: &str = "token";
const ROLE_KEY: &str = "role";

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Invalid SQLite path: {path}")]
    InvalidSQLitePath { path: PathBuf },
}

struct Inner {
    /// Persistent storage
    db: SqlitePool,
    /// Current session, replaced as a whole on every change
    current: watch::Sender<Option<Session>>,
    /// Serializes writers, so the persisted and published sessions never diverge
    write: Mutex<()>,
}

/// Injectable session store
#[derive(Clone)]
pub struct SessionStore(Arc<Inner>);

impl SessionStore {
    /// Store for testing purposes - using the in-memory SQLite database
    #[cfg(test)]
    pub async fn test() -> Result<Self> {
        Self::with_config(config::Store::Memory { max_connections: 1 }).await
    }

    /// Store from configuration
    ///
    /// If the database is created in-memory, the migrations are being executed automatically. If
    /// database is file based migrations would be executed only if requested by configuration.
    pub async fn with_config(config: config::Store) -> Result<Self> {
        use config::Store::*;

        let db = match config {
            Memory { max_connections } => {
                // Named shared-cache database, one per pool. It is gone once its last connection
                // closes, so connections are never recycled.
                let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;

                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(opts)
                    .await?;

                sqlx::migrate!("./migrations").run(&pool).await?;
                pool
            }

            SqLite {
                path,
                max_connections,
                migrate,
            } => {
                let path = path
                    .as_path()
                    .to_str()
                    .ok_or_else(|| Error::InvalidSQLitePath { path: path.clone() })?;

                let opts = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true);

                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect_lazy_with(opts);

                if migrate {
                    sqlx::migrate!("./migrations").run(&pool).await?;
                }

                pool
            }
        };

        Self::with_pool(db).await
    }

    /// Store over an already migrated database, restoring the persisted session
    pub async fn with_pool(db: SqlitePool) -> Result<Self> {
        let session = load(&db).await?;
        match &session {
            Some(session) => info!(role = %session.role, "Restored persisted session"),
            None => debug!("No persisted session"),
        }

        let (current, _) = watch::channel(session);
        Ok(Self(Arc::new(Inner {
            db,
            current,
            write: Mutex::new(()),
        })))
    }

    /// Snapshot of the current session
    pub fn current(&self) -> Option<Session> {
        self.0.current.borrow().clone()
    }

    /// Subscribes for session changes
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.0.current.subscribe()
    }

    /// Runs the gate against the current session
    pub fn authorize(&self, require_admin: bool) -> Decision {
        authorize(self.0.current.borrow().as_ref(), require_admin)
    }

    /// Replaces the session after successful login
    pub async fn establish(&self, session: Session) -> Result<()> {
        let _guard = self.0.write.lock().await;
        persist(&self.0.db, Some(&session)).await?;

        info!(role = %session.role, "Session established");
        self.0.current.send_replace(Some(session));
        Ok(())
    }

    /// Explicit logout
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.0.write.lock().await;
        persist(&self.0.db, None).await?;

        info!("Session closed");
        self.0.current.send_replace(None);
        Ok(())
    }

    /// Drops the session after the API refused the `refused` token
    ///
    /// Nothing happens if the session was already replaced with another one in the meantime. The
    /// published session is cleared even if it cannot be removed from the persistent storage, so
    /// the next gate check sends the user to the login page regardless.
    pub async fn invalidate(&self, refused: &Token, reason: &str) {
        let _guard = self.0.write.lock().await;
        let cleared = self.0.current.send_if_modified(|current| {
            if current.as_ref().is_some_and(|session| &session.token == refused) {
                *current = None;
                true
            } else {
                false
            }
        });

        if !cleared {
            debug!(reason, "Refused session is no longer current");
            return;
        }

        warn!(reason, "Session invalidated");
        if let Err(err) = persist(&self.0.db, None).await {
            warn!(%err, "Cannot remove invalidated session from the storage");
        }
    }
}

/// Reads the persisted session
///
/// Anything else than a complete `(token, role)` pair is discarded.
async fn load(db: &SqlitePool) -> Result<Option<Session>> {
    let rows: Vec<(String, String)> = sqlx::query_as("select key, value from session_values")
        .fetch_all(db)
        .await?;

    if rows.is_empty() {
        return Ok(None);
    }

    let mut token = None;
    let mut role = None;
    for (key, value) in rows {
        match key.as_str() {
            TOKEN_KEY => token = Some(value),
            ROLE_KEY => role = Some(value),
            other => warn!(key = other, "Unexpected persisted session entry"),
        }
    }

    match (token, role.map(|role| role.parse::<Role>())) {
        (Some(token), Some(Ok(role))) => Ok(Some(Session::new(Token::new(token), role))),
        _ => {
            warn!("Persisted session is incomplete, discarding it");
            persist(db, None).await?;
            Ok(None)
        }
    }
}

/// Replaces the persisted session in a single transaction
async fn persist(db: &SqlitePool, session: Option<&Session>) -> Result<()> {
    let mut tx = db.begin().await?;

    sqlx::query("delete from session_values")
        .execute(&mut *tx)
        .await?;

    if let Some(session) = session {
        sqlx::query("insert into session_values (key, value) values (?, ?), (?, ?)")
            .bind(TOKEN_KEY)
            .bind(session.token.expose())
            .bind(ROLE_KEY)
            .bind(session.role.as_str())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}
