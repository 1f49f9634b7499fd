//! Live collection listeners.
//!
//! # Responsibility
//! - Deliver the full collection each time a committed change is observed.
//! - Track open listeners so leaked subscriptions are visible.
//!
//! # Invariants
//! - The first `next()` yields the current contents without waiting.
//! - A listener is released exactly once, on `close()` or drop.
//! - Changes that land while the consumer is busy coalesce into one snapshot.
//! - Snapshots are read on the blocking pool.

use crate::model::activity::ActivityRecord;
use crate::store::{PersistenceError, PersistenceResult};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// One delivery from a live listener.
pub type SnapshotResult = PersistenceResult<Vec<ActivityRecord>>;

/// Reads the full, ordered collection for a listener.
pub(crate) trait SnapshotSource: Send + Sync {
    fn collection_name(&self) -> &str;
    fn load_snapshot(&self) -> SnapshotResult;
}

/// Counts open listeners for one backend.
#[derive(Debug, Default)]
pub(crate) struct ListenerRegistry {
    active: AtomicUsize,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    fn open(&self) -> u64 {
        self.active.fetch_add(1, Ordering::AcqRel);
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn release(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Handle to one live listener over a collection.
///
/// Dropping the handle releases the listener; `close()` does the same
/// explicitly.
pub struct Subscription {
    listener_id: u64,
    source: Arc<dyn SnapshotSource>,
    changes: watch::Receiver<u64>,
    registry: Arc<ListenerRegistry>,
    primed: bool,
    released: bool,
}

impl Subscription {
    pub(crate) fn open(
        source: Arc<dyn SnapshotSource>,
        changes: watch::Receiver<u64>,
        registry: Arc<ListenerRegistry>,
    ) -> Self {
        let listener_id = registry.open();
        info!(
            "event=listener_open module=store status=ok listener_id={listener_id} collection={} active={}",
            source.collection_name(),
            registry.active()
        );
        Self {
            listener_id,
            source,
            changes,
            registry,
            primed: false,
            released: false,
        }
    }

    /// Waits for the next snapshot.
    ///
    /// Read failures are delivered as `Some(Err(..))` and the listener stays
    /// open. The source store owns the change feed, so the feed outlives
    /// this handle and `None` is not returned in practice; callers still
    /// treat it as end of stream.
    pub async fn next(&mut self) -> Option<SnapshotResult> {
        if self.primed {
            if self.changes.changed().await.is_err() {
                debug!(
                    "event=listener_feed_closed module=store listener_id={}",
                    self.listener_id
                );
                return None;
            }
        } else {
            self.primed = true;
        }

        let revision = *self.changes.borrow_and_update();
        let source = Arc::clone(&self.source);
        let snapshot = tokio::task::spawn_blocking(move || source.load_snapshot())
            .await
            .unwrap_or_else(|err| {
                Err(PersistenceError::Unavailable(format!(
                    "snapshot task failed: {err}"
                )))
            });
        match &snapshot {
            Ok(items) => debug!(
                "event=snapshot_delivered module=store status=ok listener_id={} revision={revision} count={}",
                self.listener_id,
                items.len()
            ),
            Err(err) => warn!(
                "event=snapshot_delivered module=store status=error listener_id={} revision={revision} error={err}",
                self.listener_id
            ),
        }
        Some(snapshot)
    }

    /// Stable id of this listener within its backend, for diagnostics.
    pub fn listener_id(&self) -> u64 {
        self.listener_id
    }

    /// Releases the listener.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.registry.release();
        info!(
            "event=listener_close module=store status=ok listener_id={} collection={} active={}",
            self.listener_id,
            self.source.collection_name(),
            self.registry.active()
        );
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
