use activity_core::{backend, init_backend, ActivityRecord, ActivityStore, BackendConfig, BackendError};

#[tokio::test]
async fn init_backend_is_idempotent_and_rejects_a_different_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = BackendConfig::new(dir.path().join("activity.db"), "activities").unwrap();
    let other = BackendConfig::new(dir.path().join("other.db"), "activities").unwrap();

    assert!(backend().is_none());

    let first = init_backend(&config).unwrap();
    let second = init_backend(&config).unwrap();

    let id = first
        .collection(&config.collection)
        .create(&ActivityRecord::new("shared"))
        .await
        .unwrap();
    let seen = second.collection(&config.collection).get(&id).unwrap();
    assert_eq!(seen.map(|record| record.name).as_deref(), Some("shared"));
    assert_eq!(first.revision(&config.collection), 1);
    assert_eq!(second.revision(&config.collection), 1);

    match init_backend(&other).unwrap_err() {
        BackendError::AlreadyInitialized { active, requested } => {
            assert_eq!(active, config.db_path);
            assert_eq!(requested, other.db_path);
        }
        err => panic!("unexpected error: {err}"),
    }

    let global = backend().expect("backend should be initialized");
    assert_eq!(global.location(), Some(config.db_path.as_path()));
}
