use std::time::Duration;

use pretty_assertions::assert_eq;
use tracker_core::{
    update, AppState, Effect, KeyValueStore, MemoryStore, Msg, SingleIndicator, StorageResult,
    TaskId, TaskStore, TrackedTask, ACTIVE_TASKS_KEY,
};

fn init_logging() {
    engine_logging::initialize_for_tests();
}

fn tracked(task_id: &str, site_id: u64) -> TrackedTask {
    TrackedTask {
        task_id: TaskId::new(task_id),
        site_id,
    }
}

struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn read(&self, _key: &str) -> StorageResult<Option<String>> {
        Err("disk unplugged".into())
    }

    fn write(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err("disk unplugged".into())
    }
}

#[test]
fn repeated_add_with_same_task_id_is_ignored() {
    let mut store = TaskStore::new();
    assert!(store.add(TaskId::new("A"), 1));
    let snapshot = store.clone();

    assert!(!store.add(TaskId::new("A"), 1));
    assert!(!store.add(TaskId::new("A"), 2));
    assert_eq!(store, snapshot);
    assert_eq!(store.all(), &[tracked("A", 1)]);
}

#[test]
fn duplicate_site_is_left_to_the_caller() {
    let mut store = TaskStore::new();
    store.add(TaskId::new("A"), 1);
    store.add(TaskId::new("B"), 1);
    assert_eq!(store.len(), 2);
    assert!(store.contains_site(1));
}

#[test]
fn removed_task_is_gone_whatever_the_size() {
    for size in [1usize, 2, 5, 20] {
        let mut store = TaskStore::new();
        for i in 0..size {
            store.add(TaskId::from(i as u64), i as u64);
        }
        let victim = TaskId::from((size / 2) as u64);

        assert!(store.remove(&victim));
        assert!(store.all().iter().all(|task| task.task_id != victim));
        assert_eq!(store.len(), size - 1);
        assert!(!store.remove(&victim));
    }
}

#[test]
fn saved_tasks_load_back_in_order() {
    init_logging();
    let storage = MemoryStore::new();
    let mut store = TaskStore::new();
    store.add(TaskId::new("b"), 2);
    store.add(TaskId::new("a"), 1);
    store.save(&storage);

    assert_eq!(
        storage.get(ACTIVE_TASKS_KEY).as_deref(),
        Some(r#"[{"taskId":"b","siteId":2},{"taskId":"a","siteId":1}]"#)
    );
    assert_eq!(TaskStore::load(&storage), store);
}

#[test]
fn numeric_task_ids_from_older_clients_are_accepted() {
    let storage = MemoryStore::with_entry(ACTIVE_TASKS_KEY, r#"[{"taskId":12,"siteId":42}]"#);
    let store = TaskStore::load(&storage);
    assert_eq!(store.all(), &[tracked("12", 42)]);
}

#[test]
fn corrupt_or_missing_state_resets_to_empty() {
    init_logging();
    for raw in ["{not json", r#"{"taskId":"A"}"#, r#"[{"siteId":3}]"#] {
        let storage = MemoryStore::with_entry(ACTIVE_TASKS_KEY, raw);
        assert!(TaskStore::load(&storage).is_empty(), "input {raw}");
    }
    assert!(TaskStore::load(&MemoryStore::new()).is_empty());
}

#[test]
fn storage_failures_are_swallowed() {
    init_logging();
    let mut store = TaskStore::new();
    store.add(TaskId::new("A"), 1);
    store.save(&BrokenStore);
    assert!(TaskStore::load(&BrokenStore).is_empty());
}

#[test]
fn restored_tasks_resume_polling_and_lock_their_rows() {
    init_logging();
    let mut store = TaskStore::new();
    store.add(TaskId::new("A"), 7);

    let (state, effects) = update(AppState::new(), Msg::TasksRestored(store.clone()));

    assert_eq!(
        effects,
        vec![
            Effect::FetchActiveFull,
            Effect::StartPollTimer {
                interval: Duration::from_secs(2)
            },
        ]
    );
    assert_eq!(state.store(), &store);
    assert_eq!(state.indicator(7), Some(&SingleIndicator::Resuming));
    assert!(!state.is_action_enabled(7));

    let (_state, effects) = update(state, Msg::StartSingleClicked { site_id: 7 });
    assert!(effects.is_empty());
}

#[test]
fn empty_restore_only_looks_up_the_full_task() {
    let (state, effects) = update(AppState::new(), Msg::TasksRestored(TaskStore::new()));
    assert_eq!(effects, vec![Effect::FetchActiveFull]);
    assert!(!state.poller().is_active());
    assert!(!state.is_idle());
}
