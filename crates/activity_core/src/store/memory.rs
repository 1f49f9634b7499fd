//! In-process activity collection.
//!
//! Stands in for the backing store wherever a real database is unwanted:
//! projector tests, previews and demos. Writes and the live feed can be made
//! to fail on demand, and every store call that reaches the collection is
//! counted so callers can assert that validation short-circuited.

use crate::model::activity::{validate_name, ActivityId, ActivityRecord};
use crate::store::subscription::{ListenerRegistry, SnapshotResult, SnapshotSource, Subscription};
use crate::store::{ActivityStore, PersistenceError, PersistenceResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

const COLLECTION_NAME: &str = "memory";

#[derive(Default)]
struct Faults {
    writes: Option<String>,
    feed: Option<String>,
}

struct MemoryInner {
    documents: Mutex<HashMap<ActivityId, ActivityRecord>>,
    faults: Mutex<Faults>,
    changes: watch::Sender<u64>,
    listeners: Arc<ListenerRegistry>,
    store_calls: AtomicU64,
    next_id: AtomicU64,
}

/// Shared in-memory collection; clones observe the same documents.
#[derive(Clone)]
pub struct MemoryActivityStore {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryActivityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(MemoryInner {
                documents: Mutex::new(HashMap::new()),
                faults: Mutex::new(Faults::default()),
                changes,
                listeners: Arc::new(ListenerRegistry::default()),
                store_calls: AtomicU64::new(0),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Inserts records as-is, assigning ids to those without one.
    pub fn seed(&self, records: impl IntoIterator<Item = ActivityRecord>) {
        {
            let mut documents = self.documents();
            for mut record in records {
                if !record.is_persisted() {
                    record.id = self.allocate_id();
                }
                documents.insert(record.id.clone(), record);
            }
        }
        self.notify_change();
    }

    /// Makes every following write fail with `message` until cleared.
    pub fn fail_writes(&self, message: impl Into<String>) {
        self.faults().writes = Some(message.into());
    }

    /// Breaks the live feed: listeners receive an error until cleared.
    pub fn fail_feed(&self, message: impl Into<String>) {
        self.faults().feed = Some(message.into());
        self.notify_change();
    }

    /// Clears injected write and feed failures.
    pub fn clear_faults(&self) {
        *self.faults() = Faults::default();
        self.notify_change();
    }

    /// Number of mutation calls that reached the collection.
    pub fn store_calls(&self) -> u64 {
        self.inner.store_calls.load(Ordering::Acquire)
    }

    pub fn active_listeners(&self) -> usize {
        self.inner.listeners.active()
    }

    pub fn get(&self, id: &str) -> Option<ActivityRecord> {
        self.documents().get(id).cloned()
    }

    fn documents(&self) -> MutexGuard<'_, HashMap<ActivityId, ActivityRecord>> {
        self.inner
            .documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.inner
            .faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn allocate_id(&self) -> ActivityId {
        let next = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("mem-{next:04}")
    }

    fn notify_change(&self) {
        self.inner.changes.send_modify(|revision| *revision += 1);
    }

    fn begin_write(&self) -> PersistenceResult<()> {
        self.inner.store_calls.fetch_add(1, Ordering::AcqRel);
        match &self.faults().writes {
            Some(message) => Err(PersistenceError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }

    fn update(
        &self,
        id: &str,
        apply: impl FnOnce(&mut ActivityRecord),
    ) -> PersistenceResult<()> {
        self.begin_write()?;
        {
            let mut documents = self.documents();
            let record = documents
                .get_mut(id)
                .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
            apply(record);
        }
        self.notify_change();
        Ok(())
    }
}

impl SnapshotSource for MemoryActivityStore {
    fn collection_name(&self) -> &str {
        COLLECTION_NAME
    }

    fn load_snapshot(&self) -> SnapshotResult {
        if let Some(message) = &self.faults().feed {
            return Err(PersistenceError::Unavailable(message.clone()));
        }
        let mut records = self.documents().values().cloned().collect::<Vec<_>>();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    fn subscribe(&self) -> Subscription {
        Subscription::open(
            Arc::new(self.clone()),
            self.inner.changes.subscribe(),
            Arc::clone(&self.inner.listeners),
        )
    }

    async fn create(&self, record: &ActivityRecord) -> PersistenceResult<ActivityId> {
        record.validate()?;
        self.begin_write()?;

        let id = self.allocate_id();
        let mut stored = record.clone();
        stored.id = id.clone();
        self.documents().insert(id.clone(), stored);
        self.notify_change();
        Ok(id)
    }

    async fn set_completed(&self, id: &str, value: bool) -> PersistenceResult<()> {
        self.update(id, |record| record.completed = value)
    }

    async fn rename(&self, id: &str, new_name: &str) -> PersistenceResult<()> {
        if validate_name(new_name).is_err() {
            return Ok(());
        }
        self.update(id, |record| record.name = new_name.to_string())
    }

    async fn delete(&self, id: &str) -> PersistenceResult<()> {
        self.begin_write()?;
        let removed = self.documents().remove(id).is_some();
        if removed {
            self.notify_change();
        }
        Ok(())
    }
}
