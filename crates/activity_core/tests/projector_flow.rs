use activity_core::projector::{
    MSG_ADDED, MSG_BLANK_NAME, MSG_DELETED, MSG_EDITED,
};
use activity_core::{
    ActivityProjector, ActivityRecord, BackendClient, MemoryActivityStore, ViewPhase, ViewState,
};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

async fn ready(projector: &ActivityProjector<MemoryActivityStore>) -> ViewState {
    projector
        .wait_for(WAIT, |view| !view.loading)
        .await
        .expect("first snapshot should arrive")
}

fn seeded(records: &[(&str, &str, i64, bool)]) -> MemoryActivityStore {
    let store = MemoryActivityStore::new();
    store.seed(records.iter().map(|(id, name, created_at, completed)| {
        let mut record = ActivityRecord::with_created_at(*name, *created_at);
        record.id = id.to_string();
        record.completed = *completed;
        record
    }));
    store
}

#[tokio::test]
async fn empty_collection_goes_from_loading_to_ready_and_empty() {
    let store = MemoryActivityStore::new();
    let projector = ActivityProjector::start(Arc::new(store.clone())).await;

    let initial = projector.state();
    assert!(initial.loading);
    assert!(initial.items.is_empty());
    assert_eq!(store.active_listeners(), 1);

    let view = ready(&projector).await;
    assert_eq!(view.phase(), ViewPhase::Ready);
    assert!(view.items.is_empty());
    assert!(view.message.is_none());
}

#[tokio::test]
async fn add_on_empty_collection_yields_one_incomplete_record() {
    let store = MemoryActivityStore::new();
    let projector = ActivityProjector::start(Arc::new(store.clone())).await;
    let before = ready(&projector).await.revision;

    assert!(projector.request_add("Buy milk").unwrap().await.unwrap());
    let view = projector
        .wait_for(WAIT, |view| view.revision > before && view.items.len() == 1)
        .await
        .expect("snapshot with new record");

    assert_eq!(view.items[0].name, "Buy milk");
    assert!(!view.items[0].completed);
    assert!(view.items[0].is_persisted());
    assert_eq!(projector.take_message().as_deref(), Some(MSG_ADDED));
    assert!(projector.message().is_none());
}

#[tokio::test]
async fn blank_add_sets_validation_message_without_store_call() {
    let store = MemoryActivityStore::new();
    let projector = ActivityProjector::start(Arc::new(store.clone())).await;
    ready(&projector).await;

    for name in ["", "   ", "\t\n"] {
        assert!(projector.request_add(name).is_none());
        assert_eq!(projector.take_message().as_deref(), Some(MSG_BLANK_NAME));
    }
    assert_eq!(store.store_calls(), 0);
}

#[tokio::test]
async fn toggle_flips_completed_and_keeps_other_fields() {
    let store = seeded(&[("a", "Walk", 50, false)]);
    let projector = ActivityProjector::start(Arc::new(store.clone())).await;
    let view = ready(&projector).await;
    let record = view.find("a").cloned().unwrap();

    projector.request_toggle(&record).unwrap().await.unwrap();
    let toggled = projector
        .wait_for(WAIT, |view| view.find("a").is_some_and(|r| r.completed))
        .await
        .unwrap();
    let after = toggled.find("a").unwrap();
    assert_eq!(after.name, record.name);
    assert_eq!(after.created_at, record.created_at);
    assert!(projector.message().is_none(), "toggle success is silent");

    projector.request_toggle(after).unwrap().await.unwrap();
    projector
        .wait_for(WAIT, |view| view.find("a").is_some_and(|r| !r.completed))
        .await
        .unwrap();
}

#[tokio::test]
async fn unchanged_or_blank_edit_is_dropped_silently() {
    let store = seeded(&[("a", "Walk", 50, false)]);
    let projector = ActivityProjector::start(Arc::new(store.clone())).await;
    let record = ready(&projector).await.find("a").cloned().unwrap();

    assert!(projector.request_edit(&record, "Walk").is_none());
    assert!(projector.request_edit(&record, "").is_none());
    assert!(projector.request_edit(&record, "   ").is_none());
    assert!(projector.message().is_none());
    assert_eq!(store.store_calls(), 0);
}

#[tokio::test]
async fn edit_renames_and_reports_success() {
    let store = seeded(&[("a", "Walk", 50, false)]);
    let projector = ActivityProjector::start(Arc::new(store.clone())).await;
    let record = ready(&projector).await.find("a").cloned().unwrap();

    projector.request_edit(&record, "Walk the dog").unwrap().await.unwrap();
    let view = projector
        .wait_for(WAIT, |view| {
            view.find("a").is_some_and(|r| r.name == "Walk the dog")
        })
        .await
        .unwrap();
    assert_eq!(view.find("a").unwrap().created_at, 50);
    assert_eq!(projector.take_message().as_deref(), Some(MSG_EDITED));
}

#[tokio::test]
async fn delete_removes_record_and_repeat_delete_does_not_error() {
    let store = seeded(&[("a", "Walk", 50, false), ("b", "Read", 60, false)]);
    let projector = ActivityProjector::start(Arc::new(store.clone())).await;
    let record = ready(&projector).await.find("a").cloned().unwrap();

    projector.request_delete(&record).unwrap().await.unwrap();
    let view = projector
        .wait_for(WAIT, |view| view.find("a").is_none())
        .await
        .unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(projector.take_message().as_deref(), Some(MSG_DELETED));

    projector.request_delete(&record).unwrap().await.unwrap();
    assert_eq!(projector.take_message().as_deref(), Some(MSG_DELETED));
}

#[tokio::test]
async fn store_failures_become_messages_with_error_text() {
    let store = seeded(&[("a", "Walk", 50, false)]);
    let projector = ActivityProjector::start(Arc::new(store.clone())).await;
    let record = ready(&projector).await.find("a").cloned().unwrap();
    store.fail_writes("permission denied");

    assert!(!projector.request_add("New").unwrap().await.unwrap());
    assert_eq!(
        projector.take_message().as_deref(),
        Some("Failed to add: store unavailable: permission denied")
    );

    assert!(!projector.request_toggle(&record).unwrap().await.unwrap());
    assert_eq!(
        projector.take_message().as_deref(),
        Some("Failed to update status: store unavailable: permission denied")
    );

    assert!(!projector.request_edit(&record, "Run").unwrap().await.unwrap());
    assert_eq!(
        projector.take_message().as_deref(),
        Some("Failed to edit: store unavailable: permission denied")
    );

    assert!(!projector.request_delete(&record).unwrap().await.unwrap());
    assert_eq!(
        projector.take_message().as_deref(),
        Some("Failed to delete: store unavailable: permission denied")
    );

    let view = projector.state();
    assert_eq!(view.items.len(), 1, "intents never touch items");
    assert_eq!(view.phase(), ViewPhase::Ready);
}

#[tokio::test]
async fn toggle_of_vanished_record_reports_not_found() {
    let store = MemoryActivityStore::new();
    let projector = ActivityProjector::start(Arc::new(store.clone())).await;
    ready(&projector).await;

    let mut ghost = ActivityRecord::with_created_at("ghost", 1);
    ghost.id = "ghost-id".to_string();
    projector.request_toggle(&ghost).unwrap().await.unwrap();
    let message = projector.take_message().unwrap();
    assert!(message.starts_with("Failed to update status"));
    assert!(message.contains("ghost-id"));
}

#[tokio::test]
async fn feed_errors_surface_as_distinct_state_and_recover() {
    let store = seeded(&[("a", "Walk", 50, false)]);
    let projector = ActivityProjector::start(Arc::new(store.clone())).await;
    let before = ready(&projector).await.revision;

    store.fail_feed("listener revoked");
    let broken = projector
        .wait_for_snapshot_after(before, WAIT)
        .await
        .unwrap();
    assert_eq!(broken.phase(), ViewPhase::FeedError);
    assert!(broken.items.is_empty());
    assert!(!broken.loading);
    assert!(broken.message.is_none(), "feed errors do not post messages");
    assert!(broken
        .feed_error
        .as_deref()
        .is_some_and(|error| error.contains("listener revoked")));

    store.clear_faults();
    let recovered = projector
        .wait_for(WAIT, |view| view.phase() == ViewPhase::Ready)
        .await
        .unwrap();
    assert_eq!(recovered.items.len(), 1);
}

#[tokio::test]
async fn message_shown_clears_pending_message() {
    let projector = ActivityProjector::start(Arc::new(MemoryActivityStore::new())).await;
    projector.request_add(" ");
    assert!(projector.message().is_some());
    projector.message_shown();
    assert!(projector.message().is_none());
    assert!(projector.take_message().is_none());
}

#[tokio::test]
async fn shutdown_releases_the_single_subscription() {
    let store = MemoryActivityStore::new();
    let projector = ActivityProjector::start(Arc::new(store.clone())).await;
    ready(&projector).await;
    assert_eq!(store.active_listeners(), 1);

    let watcher = projector.watch();
    projector.shutdown().await;
    assert_eq!(store.active_listeners(), 0);

    store.seed([ActivityRecord::new("after teardown")]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(watcher.borrow().items.is_empty());
}

#[tokio::test]
async fn dropping_projector_releases_subscription() {
    let store = MemoryActivityStore::new();
    {
        let projector = ActivityProjector::start(Arc::new(store.clone())).await;
        ready(&projector).await;
    }
    for _ in 0..50 {
        if store.active_listeners() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.active_listeners(), 0);
}

#[tokio::test]
async fn sqlite_backed_projector_round_trips_through_the_store() {
    let store = Arc::new(BackendClient::open_in_memory().unwrap().collection("activities"));
    let projector = ActivityProjector::start(Arc::clone(&store)).await;
    projector.wait_for(WAIT, |view| !view.loading).await.unwrap();

    projector.request_add("Buy milk").unwrap().await.unwrap();
    let view = projector
        .wait_for(WAIT, |view| view.items.len() == 1)
        .await
        .unwrap();
    let record = view.items[0].clone();
    assert_eq!(record.name, "Buy milk");

    projector.request_delete(&record).unwrap().await.unwrap();
    projector
        .wait_for(WAIT, |view| view.items.is_empty())
        .await
        .unwrap();

    projector.shutdown().await;
    assert_eq!(store.active_listeners(), 0);
}
