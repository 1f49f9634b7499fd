//! Activity screen projector.
//!
//! # Responsibility
//! - Subscribe once to the store and mirror each snapshot into [`ViewState`].
//! - Dispatch add/toggle/edit/delete intents as background store calls.
//!
//! # Invariants
//! - Intents only ever write `message`; the feed task owns the rest.
//! - Blank names never reach the store. Unchanged edits are dropped silently.
//! - Teardown closes the subscription exactly once.

use crate::model::activity::{validate_name, ActivityRecord};
use crate::projector::view_state::ViewState;
use crate::store::{ActivityStore, PersistenceResult, Subscription};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Background store call started by an intent.
///
/// Resolves to `true` when the store accepted the write. Callers may drop it.
pub type IntentHandle = JoinHandle<bool>;

pub const MSG_BLANK_NAME: &str = "Activity name cannot be empty.";
pub const MSG_ADDED: &str = "Activity added.";
pub const MSG_EDITED: &str = "Activity updated.";
pub const MSG_DELETED: &str = "Activity deleted.";
pub const MSG_ADD_FAILED: &str = "Failed to add";
pub const MSG_TOGGLE_FAILED: &str = "Failed to update status";
pub const MSG_EDIT_FAILED: &str = "Failed to edit";
pub const MSG_DELETE_FAILED: &str = "Failed to delete";

/// Single authoritative view state for one activity screen.
///
/// Dropping the projector tears down its subscription; `shutdown` does the
/// same and waits for the feed task to finish.
pub struct ActivityProjector<S: ActivityStore + 'static> {
    store: Arc<S>,
    state: Arc<watch::Sender<ViewState>>,
    runtime: Handle,
    stop: watch::Sender<bool>,
    feed: Option<JoinHandle<()>>,
}

impl<S: ActivityStore + 'static> ActivityProjector<S> {
    /// Starts a projector on the runtime driving the caller.
    pub async fn start(store: Arc<S>) -> Self {
        Self::start_on(store, Handle::current())
    }

    /// Starts a projector whose background work runs on `runtime`.
    ///
    /// Usable from synchronous callers that own a runtime handle.
    pub fn start_on(store: Arc<S>, runtime: Handle) -> Self {
        let (state, _) = watch::channel(ViewState::initializing());
        let state = Arc::new(state);
        let (stop, stop_rx) = watch::channel(false);

        let subscription = store.subscribe();
        info!(
            "event=projector_start module=projector status=ok listener_id={}",
            subscription.listener_id()
        );
        let feed = runtime.spawn(run_feed(subscription, Arc::clone(&state), stop_rx));

        Self {
            store,
            state,
            runtime,
            stop,
            feed: Some(feed),
        }
    }

    /// Returns a copy of the current view state.
    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// Returns a receiver notified on every view-state change.
    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn items(&self) -> Vec<ActivityRecord> {
        self.state.borrow().items.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn message(&self) -> Option<String> {
        self.state.borrow().message.clone()
    }

    /// Returns the pending one-shot message and clears it.
    pub fn take_message(&self) -> Option<String> {
        let mut taken = None;
        self.state.send_if_modified(|view| {
            taken = view.message.take();
            taken.is_some()
        });
        taken
    }

    /// Clears the one-shot message after the consumer displayed it.
    pub fn message_shown(&self) {
        let _ = self.take_message();
    }

    /// Waits until `predicate` holds, or `timeout` elapses.
    pub async fn wait_for(
        &self,
        timeout: Duration,
        predicate: impl FnMut(&ViewState) -> bool,
    ) -> Option<ViewState> {
        let mut receiver = self.state.subscribe();
        let view = match tokio::time::timeout(timeout, receiver.wait_for(predicate)).await {
            Ok(Ok(view)) => Some(view.clone()),
            _ => None,
        };
        view
    }

    /// Waits for the first feed delivery after `revision`.
    pub async fn wait_for_snapshot_after(
        &self,
        revision: u64,
        timeout: Duration,
    ) -> Option<ViewState> {
        self.wait_for(timeout, |view| view.revision > revision).await
    }

    /// Persists a new activity named `name`.
    ///
    /// Returns `None` when the name is blank; the rejection is reported
    /// through `message` and no store call is made.
    pub fn request_add(&self, name: &str) -> Option<IntentHandle> {
        if validate_name(name).is_err() {
            debug!("event=intent_add module=projector status=rejected reason=blank_name");
            self.post_message(MSG_BLANK_NAME.to_string());
            return None;
        }

        let record = ActivityRecord::new(name);
        Some(self.dispatch("add", Some(MSG_ADDED), MSG_ADD_FAILED, move |store| async move {
            store.create(&record).await.map(|_| ())
        }))
    }

    /// Flips `record.completed` in the store.
    pub fn request_toggle(&self, record: &ActivityRecord) -> Option<IntentHandle> {
        let id = record.id.clone();
        let value = !record.completed;
        Some(self.dispatch("toggle", None, MSG_TOGGLE_FAILED, move |store| async move {
            store.set_completed(&id, value).await
        }))
    }

    /// Renames `record` to `new_name`.
    ///
    /// Blank or unchanged names are dropped without a store call or message.
    pub fn request_edit(&self, record: &ActivityRecord, new_name: &str) -> Option<IntentHandle> {
        if validate_name(new_name).is_err() || new_name == record.name {
            debug!(
                "event=intent_edit module=projector status=skipped id={}",
                record.id
            );
            return None;
        }

        let id = record.id.clone();
        let new_name = new_name.to_string();
        Some(self.dispatch("edit", Some(MSG_EDITED), MSG_EDIT_FAILED, move |store| async move {
            store.rename(&id, &new_name).await
        }))
    }

    /// Deletes `record` from the store.
    pub fn request_delete(&self, record: &ActivityRecord) -> Option<IntentHandle> {
        let id = record.id.clone();
        Some(self.dispatch("delete", Some(MSG_DELETED), MSG_DELETE_FAILED, move |store| async move {
            store.delete(&id).await
        }))
    }

    /// Stops the live feed and waits until its subscription is released.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(feed) = self.feed.take() {
            if let Err(err) = feed.await {
                warn!("event=projector_stop module=projector status=error error={err}");
            }
        }
    }

    fn post_message(&self, message: String) {
        self.state.send_modify(|view| view.message = Some(message));
    }

    fn dispatch<F, Fut>(
        &self,
        intent: &'static str,
        success: Option<&'static str>,
        failure: &'static str,
        operation: F,
    ) -> IntentHandle
    where
        F: FnOnce(Arc<S>) -> Fut + Send + 'static,
        Fut: Future<Output = PersistenceResult<()>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.state);
        self.runtime.spawn(async move {
            match operation(store).await {
                Ok(()) => {
                    info!("event=intent_{intent} module=projector status=ok");
                    if let Some(message) = success {
                        state.send_modify(|view| view.message = Some(message.to_string()));
                    }
                    true
                }
                Err(err) => {
                    warn!("event=intent_{intent} module=projector status=error error={err}");
                    state.send_modify(|view| view.message = Some(format!("{failure}: {err}")));
                    false
                }
            }
        })
    }
}

impl<S: ActivityStore + 'static> Drop for ActivityProjector<S> {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

async fn run_feed(
    mut subscription: Subscription,
    state: Arc<watch::Sender<ViewState>>,
    mut stop: watch::Receiver<bool>,
) {
    let listener_id = subscription.listener_id();
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            delivery = subscription.next() => match delivery {
                Some(Ok(items)) => state.send_modify(|view| view.apply_snapshot(items)),
                Some(Err(err)) => {
                    warn!(
                        "event=feed_error module=projector status=error listener_id={listener_id} error={err}"
                    );
                    state.send_modify(|view| view.apply_feed_error(err.to_string()));
                }
                None => break,
            },
        }
    }
    subscription.close();
}
