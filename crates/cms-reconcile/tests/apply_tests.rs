use cms_content::{CollectionSchema, ItemId, Snapshot, ValidationError};
use cms_reconcile::{
    CollectionEditor, ItemBackend, Operation, ReconcileError, Reconciler, SaveStatus,
};
use cms_test_utils::{faculty_item, saved_faculty_item, snapshot_of, CallPhase, RecordingBackend};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_delete_settles_before_create() {
    let backend =
        RecordingBackend::with_collection("faculty", vec![saved_faculty_item("a1", "Kim")]);
    let reconciler = Reconciler::new(CollectionSchema::faculty());

    let original = Snapshot::from(vec![saved_faculty_item("a1", "Kim")]);
    // Same natural key, new row
    let mut working = Snapshot::from(vec![faculty_item("Kim")]);

    let change_set = reconciler.compute(&original, &working);
    let result = reconciler.apply(change_set, &backend, &mut working).await;

    assert_eq!(result.status(), SaveStatus::Saved);
    assert_eq!(
        backend.calls(),
        vec![
            (Operation::Delete, "a1".to_string()),
            (Operation::Create, "Kim".to_string()),
        ]
    );

    let events = backend.events();
    let delete_finished = events
        .iter()
        .position(|e| e.operation == Operation::Delete && e.phase == CallPhase::Finished)
        .unwrap();
    let create_started = events
        .iter()
        .position(|e| e.operation == Operation::Create && e.phase == CallPhase::Started)
        .unwrap();
    assert!(delete_finished < create_started);

    let new_id = working.items()[0].id.clone().unwrap();
    assert_ne!(new_id, ItemId::from("a1"));
}

#[tokio::test]
async fn test_phases_run_delete_create_update() {
    let backend = RecordingBackend::with_collection(
        "faculty",
        vec![saved_faculty_item("a1", "Kim"), saved_faculty_item("a2", "Ng")],
    );
    let reconciler = Reconciler::new(CollectionSchema::faculty());

    let original = Snapshot::from(vec![
        saved_faculty_item("a1", "Kim"),
        saved_faculty_item("a2", "Ng"),
    ]);
    let mut working = Snapshot::from(vec![
        faculty_item("Lee"),
        saved_faculty_item("a2", "Ng").with_order(4),
    ]);

    let change_set = reconciler.compute(&original, &working);
    let result = reconciler.apply(change_set, &backend, &mut working).await;

    assert_eq!((result.deleted, result.created, result.updated), (1, 1, 1));
    let operations: Vec<Operation> = backend.calls().into_iter().map(|(op, _)| op).collect();
    assert_eq!(
        operations,
        vec![Operation::Delete, Operation::Create, Operation::Update]
    );
}

#[tokio::test]
async fn test_one_failed_create_is_isolated() {
    let backend = RecordingBackend::new();
    backend.fail_create_named("Lee");
    let reconciler = Reconciler::new(CollectionSchema::faculty());

    let mut working = snapshot_of([faculty_item("Kim"), faculty_item("Lee"), faculty_item("Ng")]);
    let change_set = reconciler.compute(&Snapshot::new(), &working);
    let result = reconciler.apply(change_set, &backend, &mut working).await;

    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.created, 2);
    assert_eq!(result.status(), SaveStatus::PartiallySaved);
    assert_eq!(result.failures[0].operation, Operation::Create);

    let identified: Vec<bool> = working.iter().map(|item| item.has_identity()).collect();
    assert_eq!(identified, vec![true, false, true]);
    assert_eq!(backend.inner().item_count("faculty"), 2);
}

#[tokio::test]
async fn test_every_call_failing_is_failed() {
    let backend = RecordingBackend::new();
    backend.fail_all();
    let reconciler = Reconciler::new(CollectionSchema::faculty());

    let mut working = snapshot_of([faculty_item("Kim"), faculty_item("Lee")]);
    let change_set = reconciler.compute(&Snapshot::new(), &working);
    let result = reconciler.apply(change_set, &backend, &mut working).await;

    assert_eq!(result.status(), SaveStatus::Failed);
    assert!(working.iter().all(|item| !item.has_identity()));
}

#[tokio::test]
async fn test_phase_concurrency_is_bounded() {
    let backend = RecordingBackend::new();
    let reconciler = Reconciler::new(CollectionSchema::faculty()).with_max_in_flight(2);

    let mut working = snapshot_of(["A", "B", "C", "D", "E"].map(faculty_item));
    let change_set = reconciler.compute(&Snapshot::new(), &working);
    let result = reconciler.apply(change_set, &backend, &mut working).await;

    assert_eq!(result.created, 5);
    assert!(backend.max_in_flight() <= 2);

    let serial = RecordingBackend::new();
    let reconciler = Reconciler::new(CollectionSchema::faculty()).with_max_in_flight(0);
    let mut working = snapshot_of(["A", "B", "C"].map(faculty_item));
    let change_set = reconciler.compute(&Snapshot::new(), &working);
    reconciler.apply(change_set, &serial, &mut working).await;

    assert_eq!(serial.max_in_flight(), 1);
}

#[tokio::test]
async fn test_editor_round_trip() {
    let backend =
        RecordingBackend::with_collection("faculty", vec![saved_faculty_item("a1", "Kim")]);
    let mut editor = CollectionEditor::new(CollectionSchema::faculty());
    editor.load(&backend).await.unwrap();

    editor.working_mut().push(faculty_item("Lee").with_order(1));
    assert!(editor.is_dirty());

    let result = editor.save(&backend).await.unwrap();
    assert_eq!(result.status(), SaveStatus::Saved);
    assert!(!editor.is_dirty());
    assert_eq!(editor.original(), editor.working());

    let persisted = backend.list_items("faculty").await.unwrap();
    assert_eq!(persisted.len(), 2);

    backend.clear_events();
    let again = editor.save(&backend).await.unwrap();
    assert_eq!(again.status(), SaveStatus::NoChanges);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_partial_save_retries_only_failures() {
    let backend = RecordingBackend::with_collection(
        "faculty",
        vec![saved_faculty_item("a1", "Kim"), saved_faculty_item("a2", "Ng")],
    );
    let mut editor = CollectionEditor::new(CollectionSchema::faculty());
    editor.load(&backend).await.unwrap();

    for item in editor.working_mut().iter_mut() {
        item.set_field("term", "Winter 2025");
    }
    backend.fail_update("a2");

    let result = editor.save(&backend).await.unwrap();
    assert_eq!(result.status(), SaveStatus::PartiallySaved);
    assert_eq!(editor.pending_changes().updated.len(), 1);

    backend.clear_failures();
    backend.clear_events();
    let retry = editor.save(&backend).await.unwrap();

    assert_eq!(retry.status(), SaveStatus::Saved);
    assert_eq!(backend.calls(), vec![(Operation::Update, "a2".to_string())]);
    assert!(!editor.is_dirty());
}

#[tokio::test]
async fn test_ambiguous_new_items_are_rejected() {
    let backend = RecordingBackend::new();
    let mut editor = CollectionEditor::new(CollectionSchema::faculty());
    editor.working_mut().push(faculty_item("Kim"));
    editor.working_mut().push(faculty_item("Kim").with_order(1));

    let err = editor.save(&backend).await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Validation(ValidationError::AmbiguousNaturalKey { .. })
    ));
    assert_eq!(backend.call_count(), 0);
}
