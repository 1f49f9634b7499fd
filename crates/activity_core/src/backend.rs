//! Backend client bootstrap.
//!
//! # Responsibility
//! - Own the single database connection and its change feed.
//! - Hand out collection handles to persistence adapters.
//! - Offer a process-wide, once-only initialization for entry points.
//!
//! # Invariants
//! - Every committed write bumps its collection's change revision exactly
//!   once; other collections are not woken.
//! - `init_backend` is idempotent for the same database path and rejects a
//!   different one.
//! - The connection lock is never held across an `.await`.

use crate::config::BackendConfig;
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::store::subscription::ListenerRegistry;
use crate::store::{PersistenceError, PersistenceResult, SqliteActivityStore};
use log::{info, warn};
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

static BACKEND: OnceCell<BackendClient> = OnceCell::new();

#[derive(Debug)]
pub enum BackendError {
    Db(DbError),
    AlreadyInitialized { active: PathBuf, requested: PathBuf },
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::AlreadyInitialized { active, requested } => write!(
                f,
                "backend already initialized at `{}`; refusing to switch to `{}`",
                active.display(),
                requested.display()
            ),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::AlreadyInitialized { .. } => None,
        }
    }
}

impl From<DbError> for BackendError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

struct ClientInner {
    conn: Mutex<Connection>,
    feeds: Mutex<HashMap<String, Arc<watch::Sender<u64>>>>,
    listeners: Arc<ListenerRegistry>,
    location: Option<PathBuf>,
}

/// Shared connection handle to the embedded document store.
///
/// Cloning is cheap; all clones share the connection, the per-collection
/// change feeds and the listener registry.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<ClientInner>,
}

impl BackendClient {
    /// Opens a client over a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let conn = open_db(path)?;
        Ok(Self::from_connection(conn, Some(path.to_path_buf())))
    }

    /// Opens a client over a private in-memory database.
    pub fn open_in_memory() -> Result<Self, BackendError> {
        let conn = open_db_in_memory()?;
        Ok(Self::from_connection(conn, None))
    }

    fn from_connection(conn: Connection, location: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                conn: Mutex::new(conn),
                feeds: Mutex::new(HashMap::new()),
                listeners: Arc::new(ListenerRegistry::default()),
                location,
            }),
        }
    }

    /// Returns an adapter bound to one named collection.
    pub fn collection(&self, name: impl Into<String>) -> SqliteActivityStore {
        SqliteActivityStore::new(self.clone(), name)
    }

    /// Database file backing this client, `None` for in-memory clients.
    pub fn location(&self) -> Option<&Path> {
        self.inner.location.as_deref()
    }

    /// Number of live listeners currently open across all collections.
    pub fn active_listeners(&self) -> usize {
        self.inner.listeners.active()
    }

    /// Current change revision of `collection`; increases by one per
    /// committed write to that collection.
    pub fn revision(&self, collection: &str) -> u64 {
        *self.change_feed(collection).borrow()
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> PersistenceResult<T>,
    ) -> PersistenceResult<T> {
        let conn = self
            .inner
            .conn
            .lock()
            .map_err(|_| PersistenceError::Unavailable("connection lock poisoned".to_string()))?;
        f(&conn)
    }

    /// Returns the change feed of `collection`, creating it on first use.
    pub(crate) fn change_feed(&self, collection: &str) -> Arc<watch::Sender<u64>> {
        let mut feeds = self
            .inner
            .feeds
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            feeds
                .entry(collection.to_string())
                .or_insert_with(|| Arc::new(watch::channel(0).0)),
        )
    }

    pub(crate) fn listener_registry(&self) -> Arc<ListenerRegistry> {
        Arc::clone(&self.inner.listeners)
    }
}

impl Debug for BackendClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("location", &self.inner.location)
            .field("active_listeners", &self.active_listeners())
            .finish()
    }
}

/// Initializes the process-wide backend client once.
///
/// # Invariants
/// - Repeated calls with the same `db_path` return the same client.
/// - A call with a different `db_path` is rejected.
pub fn init_backend(config: &BackendConfig) -> Result<BackendClient, BackendError> {
    let client = BACKEND.get_or_try_init(|| {
        let client = BackendClient::open(&config.db_path)?;
        info!(
            "event=backend_init module=backend status=ok db_path={}",
            config.db_path.display()
        );
        Ok::<_, BackendError>(client)
    })?;

    match client.location() {
        Some(active) if active == config.db_path.as_path() => Ok(client.clone()),
        active => {
            let active = active.map(Path::to_path_buf).unwrap_or_default();
            warn!(
                "event=backend_init module=backend status=error error_code=already_initialized active={} requested={}",
                active.display(),
                config.db_path.display()
            );
            Err(BackendError::AlreadyInitialized {
                active,
                requested: config.db_path.clone(),
            })
        }
    }
}

/// Returns the process-wide client when `init_backend` has succeeded.
pub fn backend() -> Option<BackendClient> {
    BACKEND.get().cloned()
}
