//! FFI use-case API for the activity screen.
//!
//! # Responsibility
//! - Expose the screen's three observables and four intents to Dart via FRB.
//! - Own the tokio runtime that drives the live feed and store calls.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - At most one screen (projector) is open per process.
//! - Errors are returned as non-empty strings; success is an empty string.

use activity_core::{
    core_version as core_version_inner, init_backend, init_logging as init_logging_inner,
    ping as ping_inner, ActivityProjector, ActivityRecord, BackendConfig, SqliteActivityStore,
    ViewState,
};
use log::info;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::{Builder, Runtime};

type Screen = ActivityProjector<SqliteActivityStore>;

static RUNTIME: OnceCell<Runtime> = OnceCell::new();
static SCREEN: Mutex<Option<Screen>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes core logging once per process.
///
/// # FFI contract
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path for rolling logs.
/// - Idempotent for the same inputs; conflicting reconfiguration returns an
///   error message.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// One card in the activity list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityItem {
    pub id: String,
    pub name: String,
    /// Creation time in epoch milliseconds.
    pub created_at_ms: i64,
    /// Creation time formatted as `dd-MM-yyyy HH:mm`.
    pub created_at_display: String,
    pub completed: bool,
}

/// Snapshot of the screen's observables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityViewState {
    pub items: Vec<ActivityItem>,
    pub loading: bool,
    /// One-shot notice; call `activity_message_shown` after displaying it.
    pub message: Option<String>,
    /// Present while live updates are broken.
    pub feed_error: Option<String>,
}

/// Opens the activity screen: bootstraps the backend and starts the live
/// subscription.
///
/// # FFI contract
/// - `db_path`/`collection` override `ACTIVITY_DB_PATH`/`ACTIVITY_COLLECTION`.
/// - Calling again while a screen is open is a no-op.
/// - Never panics; returns empty string on success.
#[flutter_rust_bridge::frb(sync)]
pub fn activity_open(db_path: Option<String>, collection: Option<String>) -> String {
    match open_screen(db_path, collection) {
        Ok(()) => String::new(),
        Err(err) => format!("activity_open failed: {err}"),
    }
}

/// Returns the current view state; `loading=true` with no items before
/// `activity_open`.
#[flutter_rust_bridge::frb(sync)]
pub fn activity_view_state() -> ActivityViewState {
    let view = with_screen(|screen| Ok(screen.state())).unwrap_or_default();
    to_view_state(view)
}

/// Adds an activity. Blank names are reported through the view `message`.
#[flutter_rust_bridge::frb(sync)]
pub fn activity_add(name: String) -> String {
    intent_result(with_screen(|screen| {
        let _ = screen.request_add(&name);
        Ok(())
    }))
}

/// Flips the completion flag of the activity with `id`.
#[flutter_rust_bridge::frb(sync)]
pub fn activity_toggle(id: String) -> String {
    intent_result(with_screen(|screen| {
        let record = find_record(screen, &id)?;
        let _ = screen.request_toggle(&record);
        Ok(())
    }))
}

/// Renames the activity with `id`. Blank or unchanged names are ignored.
#[flutter_rust_bridge::frb(sync)]
pub fn activity_edit(id: String, new_name: String) -> String {
    intent_result(with_screen(|screen| {
        let record = find_record(screen, &id)?;
        let _ = screen.request_edit(&record, &new_name);
        Ok(())
    }))
}

/// Deletes the activity with `id`.
///
/// No existence check: deleting an id that is already gone succeeds.
#[flutter_rust_bridge::frb(sync)]
pub fn activity_delete(id: String) -> String {
    intent_result(with_screen(|screen| {
        let record = find_record(screen, &id).unwrap_or_else(|_| ActivityRecord::id_only(id));
        let _ = screen.request_delete(&record);
        Ok(())
    }))
}

/// Clears the one-shot message after the UI displayed it.
#[flutter_rust_bridge::frb(sync)]
pub fn activity_message_shown() {
    let _ = with_screen(|screen| {
        screen.message_shown();
        Ok(())
    });
}

/// Closes the screen and releases its live subscription.
///
/// # FFI contract
/// - Blocks until the subscription is released.
/// - Safe to call when no screen is open.
#[flutter_rust_bridge::frb(sync)]
pub fn activity_close() {
    let screen = lock_screen().take();
    if let (Some(screen), Some(runtime)) = (screen, RUNTIME.get()) {
        runtime.block_on(screen.shutdown());
        info!("event=screen_close module=ffi status=ok");
    }
}

fn open_screen(db_path: Option<String>, collection: Option<String>) -> Result<(), String> {
    let mut slot = lock_screen();
    if slot.is_some() {
        return Ok(());
    }

    let config = resolve_config(db_path, collection)?;
    let runtime = runtime()?;
    let client = init_backend(&config).map_err(|err| err.to_string())?;
    let store = Arc::new(client.collection(config.collection.as_str()));

    *slot = Some(ActivityProjector::start_on(store, runtime.handle().clone()));
    info!(
        "event=screen_open module=ffi status=ok db_path={} collection={}",
        config.db_path.display(),
        config.collection
    );
    Ok(())
}

fn resolve_config(
    db_path: Option<String>,
    collection: Option<String>,
) -> Result<BackendConfig, String> {
    let db_path = db_path
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from);
    BackendConfig::from_env()
        .and_then(|config| config.with_overrides(db_path, collection.as_deref()))
        .map_err(|err| err.to_string())
}

fn runtime() -> Result<&'static Runtime, String> {
    RUNTIME.get_or_try_init(|| {
        Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("activity-ffi")
            .enable_all()
            .build()
            .map_err(|err| format!("failed to start runtime: {err}"))
    })
}

fn lock_screen() -> MutexGuard<'static, Option<Screen>> {
    SCREEN
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn with_screen<T>(f: impl FnOnce(&Screen) -> Result<T, String>) -> Result<T, String> {
    let slot = lock_screen();
    match slot.as_ref() {
        Some(screen) => f(screen),
        None => Err("activity screen is not open".to_string()),
    }
}

fn find_record(screen: &Screen, id: &str) -> Result<ActivityRecord, String> {
    screen
        .state()
        .find(id)
        .cloned()
        .ok_or_else(|| format!("no activity with id `{id}`"))
}

fn intent_result(result: Result<(), String>) -> String {
    match result {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

fn to_view_state(view: ViewState) -> ActivityViewState {
    ActivityViewState {
        items: view.items.into_iter().map(to_item).collect(),
        loading: view.loading,
        message: view.message,
        feed_error: view.feed_error,
    }
}

fn to_item(record: ActivityRecord) -> ActivityItem {
    ActivityItem {
        created_at_display: record.display_created_at(),
        id: record.id,
        name: record.name,
        created_at_ms: record.created_at,
        completed: record.completed,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        activity_add, activity_close, activity_delete, activity_edit, activity_message_shown,
        activity_open, activity_toggle, activity_view_state, core_version, init_logging, ping,
        ActivityViewState,
    };
    use std::time::Duration;

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        assert!(!init_logging("verbose".to_string(), "/tmp/logs".to_string()).is_empty());
    }

    #[test]
    fn screen_round_trip_through_live_feed() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ffi.db").to_string_lossy().into_owned();

        assert_eq!(activity_open(Some(db_path.clone()), Some("ffi".to_string())), "");
        assert_eq!(activity_open(Some(db_path), Some("ffi".to_string())), "");
        let ready = wait_until(|view| !view.loading);
        assert!(ready.items.is_empty());

        assert_eq!(activity_add("  ".to_string()), "");
        let rejected = wait_until(|view| view.message.is_some());
        assert_eq!(
            rejected.message.as_deref(),
            Some("Activity name cannot be empty.")
        );
        activity_message_shown();

        assert_eq!(activity_add("Buy milk".to_string()), "");
        let added = wait_until(|view| view.items.len() == 1);
        let item = added.items[0].clone();
        assert_eq!(item.name, "Buy milk");
        assert!(!item.completed);
        assert_eq!(item.created_at_display.len(), 16);

        assert_eq!(activity_toggle(item.id.clone()), "");
        wait_until(|view| view.items.first().is_some_and(|i| i.completed));

        assert_eq!(activity_edit(item.id.clone(), "Buy oat milk".to_string()), "");
        wait_until(|view| view.items.first().is_some_and(|i| i.name == "Buy oat milk"));

        assert_eq!(activity_delete(item.id.clone()), "");
        wait_until(|view| view.items.is_empty());
        activity_message_shown();
        assert_eq!(activity_delete(item.id.clone()), "");
        let repeated = wait_until(|view| view.message.is_some());
        assert_eq!(repeated.message.as_deref(), Some("Activity deleted."));
        activity_message_shown();

        assert_eq!(activity_add("Stretch ".to_string()), "");
        let padded = wait_until(|view| view.items.len() == 1);
        assert_eq!(padded.items[0].name, "Stretch ");
        assert_eq!(activity_edit(padded.items[0].id.clone(), "Stretch".to_string()), "");
        wait_until(|view| view.items.first().is_some_and(|i| i.name == "Stretch"));

        assert!(activity_toggle("missing".to_string()).contains("missing"));

        activity_close();
        assert!(activity_add("after close".to_string()).contains("not open"));
        assert!(activity_view_state().loading);
    }

    fn wait_until(mut predicate: impl FnMut(&ActivityViewState) -> bool) -> ActivityViewState {
        for _ in 0..300 {
            let view = activity_view_state();
            if predicate(&view) {
                return view;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("view state did not reach expected condition");
    }
}
