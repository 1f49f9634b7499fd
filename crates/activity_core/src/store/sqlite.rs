//! SQLite-backed activity collection.
//!
//! # Responsibility
//! - Map activity mutations onto rows of the shared `documents` table.
//! - Serve full, ordered snapshots to live listeners.
//!
//! # Invariants
//! - Ids are generated here, never by callers.
//! - A change is announced only after a write actually modified a row, and
//!   only to listeners of the same collection.
//! - Async entry points run their SQL on the blocking pool.
//! - Read paths reject malformed rows instead of masking them.

use crate::backend::BackendClient;
use crate::model::activity::{validate_name, ActivityId, ActivityRecord};
use crate::store::subscription::{SnapshotResult, SnapshotSource, Subscription};
use crate::store::{ActivityStore, PersistenceError, PersistenceResult};
use async_trait::async_trait;
use log::{error, info};
use rusqlite::{params, Connection, Row};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

const DOCUMENT_SELECT_SQL: &str = "SELECT id, name, completed, date FROM documents";

/// Activity adapter bound to one named collection of a [`BackendClient`].
#[derive(Clone)]
pub struct SqliteActivityStore {
    client: BackendClient,
    collection: Arc<str>,
    changes: Arc<watch::Sender<u64>>,
}

impl SqliteActivityStore {
    pub fn new(client: BackendClient, collection: impl Into<String>) -> Self {
        let collection: Arc<str> = Arc::from(collection.into());
        let changes = client.change_feed(&collection);
        Self {
            client,
            collection,
            changes,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    /// Number of open listeners on the underlying client.
    pub fn active_listeners(&self) -> usize {
        self.client.active_listeners()
    }

    /// Change revision of this collection.
    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    /// One-shot read of the full collection, newest first.
    pub fn list(&self) -> SnapshotResult {
        self.client
            .with_conn(|conn| list_documents(conn, &self.collection))
    }

    /// One-shot read of a single record.
    pub fn get(&self, id: &str) -> PersistenceResult<Option<ActivityRecord>> {
        self.client.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{DOCUMENT_SELECT_SQL} WHERE collection = ?1 AND id = ?2;"
            ))?;
            let mut rows = stmt.query(params![&*self.collection, id])?;
            match rows.next()? {
                Some(row) => Ok(Some(parse_document_row(row)?)),
                None => Ok(None),
            }
        })
    }

    fn write(
        &self,
        operation: &'static str,
        id: &str,
        f: impl FnOnce(&Connection) -> PersistenceResult<usize>,
    ) -> PersistenceResult<usize> {
        match self.client.with_conn(f) {
            Ok(changed) => {
                if changed > 0 {
                    self.changes.send_modify(|revision| *revision += 1);
                }
                info!(
                    "event=store_write module=store status=ok op={operation} collection={} id={id} changed={changed}",
                    self.collection
                );
                Ok(changed)
            }
            Err(err) => {
                error!(
                    "event=store_write module=store status=error op={operation} collection={} id={id} error={err}",
                    self.collection
                );
                Err(err)
            }
        }
    }

    fn update_field(
        &self,
        operation: &'static str,
        id: &str,
        sql: &'static str,
        value: &dyn rusqlite::ToSql,
    ) -> PersistenceResult<()> {
        let changed = self.write(operation, id, |conn| {
            Ok(conn.execute(sql, params![value, &*self.collection, id])?)
        })?;
        if changed == 0 {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Runs `f` against a clone of this store on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> PersistenceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> PersistenceResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|err| PersistenceError::Unavailable(format!("store task failed: {err}")))?
    }
}

impl SnapshotSource for SqliteActivityStore {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    fn load_snapshot(&self) -> SnapshotResult {
        self.list()
    }
}

#[async_trait]
impl ActivityStore for SqliteActivityStore {
    fn subscribe(&self) -> Subscription {
        Subscription::open(
            Arc::new(self.clone()),
            self.changes.subscribe(),
            self.client.listener_registry(),
        )
    }

    async fn create(&self, record: &ActivityRecord) -> PersistenceResult<ActivityId> {
        record.validate()?;

        let record = record.clone();
        self.blocking(move |store| {
            let id = Uuid::new_v4().simple().to_string();
            store.write("create", &id, |conn| {
                Ok(conn.execute(
                    "INSERT INTO documents (collection, id, name, completed, date)
                     VALUES (?1, ?2, ?3, ?4, ?5);",
                    params![
                        &*store.collection,
                        id.as_str(),
                        record.name.as_str(),
                        record.completed,
                        record.created_at,
                    ],
                )?)
            })?;
            Ok(id)
        })
        .await
    }

    async fn set_completed(&self, id: &str, value: bool) -> PersistenceResult<()> {
        let id = id.to_string();
        self.blocking(move |store| {
            store.update_field(
                "set_completed",
                &id,
                "UPDATE documents SET completed = ?1 WHERE collection = ?2 AND id = ?3;",
                &value,
            )
        })
        .await
    }

    async fn rename(&self, id: &str, new_name: &str) -> PersistenceResult<()> {
        if validate_name(new_name).is_err() {
            return Ok(());
        }
        let id = id.to_string();
        let new_name = new_name.to_string();
        self.blocking(move |store| {
            store.update_field(
                "rename",
                &id,
                "UPDATE documents SET name = ?1 WHERE collection = ?2 AND id = ?3;",
                &new_name,
            )
        })
        .await
    }

    async fn delete(&self, id: &str) -> PersistenceResult<()> {
        let id = id.to_string();
        self.blocking(move |store| {
            store.write("delete", &id, |conn| {
                Ok(conn.execute(
                    "DELETE FROM documents WHERE collection = ?1 AND id = ?2;",
                    params![&*store.collection, id.as_str()],
                )?)
            })?;
            Ok(())
        })
        .await
    }
}

fn list_documents(conn: &Connection, collection: &str) -> SnapshotResult {
    let mut stmt = conn.prepare(&format!(
        "{DOCUMENT_SELECT_SQL}
         WHERE collection = ?1
         ORDER BY date DESC, id ASC;"
    ))?;
    let mut rows = stmt.query([collection])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_document_row(row)?);
    }
    Ok(records)
}

fn parse_document_row(row: &Row<'_>) -> PersistenceResult<ActivityRecord> {
    let id: String = row.get("id")?;
    let completed = match row.get::<_, i64>("completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(PersistenceError::InvalidData(format!(
                "invalid completed value `{other}` for document `{id}`"
            )));
        }
    };

    Ok(ActivityRecord {
        id,
        name: row.get("name")?,
        created_at: row.get("date")?,
        completed,
    })
}
