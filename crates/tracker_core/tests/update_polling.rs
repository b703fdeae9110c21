use std::sync::Once;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tracker_core::{
    update, ActiveFullTask, AppState, BatchStatus, Effect, Msg, ReloadReason, RequestFailure,
    SingleIndicator, TaskId, TaskStatus, TaskStatusPayload, TaskStore, TrackedTask,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn payload(status: TaskStatus) -> TaskStatusPayload {
    TaskStatusPayload::with_status(status)
}

fn batch(entries: Vec<(&str, TaskStatusPayload)>) -> BatchStatus {
    entries
        .into_iter()
        .map(|(id, payload)| (TaskId::new(id), payload))
        .collect()
}

fn start_single(state: AppState, site_id: u64, task_id: &str) -> (AppState, Vec<Effect>) {
    let (state, _) = update(state, Msg::StartSingleClicked { site_id });
    update(
        state,
        Msg::SingleStarted {
            site_id,
            result: Ok(TaskId::new(task_id)),
        },
    )
}

fn poll(state: AppState, response: BatchStatus) -> (AppState, Vec<Effect>) {
    let (state, effects) = update(state, Msg::PollTick);
    assert!(
        matches!(effects.as_slice(), [Effect::FetchBatchStatus { .. }]),
        "tick should request a batch, got {effects:?}"
    );
    update(state, Msg::BatchStatusReceived(Ok(response)))
}

fn store_of(entries: &[(&str, u64)]) -> TaskStore {
    let mut store = TaskStore::new();
    for (task_id, site_id) in entries {
        store.add(TaskId::new(*task_id), *site_id);
    }
    store
}

#[test]
fn single_task_runs_to_completion() {
    init_logging();
    let (state, effects) = start_single(AppState::new(), 42, "A");
    assert_eq!(
        effects,
        vec![
            Effect::PersistTasks(store_of(&[("A", 42)])),
            Effect::StartPollTimer {
                interval: Duration::from_secs(2)
            },
        ]
    );
    assert_eq!(
        state.store().all(),
        &[TrackedTask {
            task_id: TaskId::new("A"),
            site_id: 42
        }]
    );

    let (state, effects) = update(state, Msg::PollTick);
    assert_eq!(
        effects,
        vec![Effect::FetchBatchStatus {
            task_ids: vec![TaskId::new("A")]
        }]
    );
    let running = TaskStatusPayload {
        status: TaskStatus::Running,
        progress_percentage: 40.0,
        processed_items: 2,
        total_items: 5,
        current_item: None,
    };
    let (state, effects) = update(
        state,
        Msg::BatchStatusReceived(Ok(batch(vec![("A", running)]))),
    );
    assert!(effects.is_empty());
    assert_eq!(state.store(), &store_of(&[("A", 42)]));
    let view = state.view();
    assert_eq!(view.singles.len(), 1);
    assert_eq!(view.singles[0].indicator.percentage(), 40.0);
    assert_eq!(
        view.singles[0].indicator,
        SingleIndicator::Running {
            percentage: 40.0,
            processed_items: 2,
            total_items: 5
        }
    );

    let (state, effects) = poll(state, batch(vec![("A", payload(TaskStatus::Completed))]));
    assert_eq!(
        effects,
        vec![
            Effect::PersistTasks(TaskStore::new()),
            Effect::ScheduleReload {
                after: Duration::from_secs(1)
            },
            Effect::StopPollTimer,
        ]
    );
    assert!(state.store().is_empty());
    assert_eq!(state.indicator(42), Some(&SingleIndicator::Done));
    assert!(state.view().reload_pending);
}

#[test]
fn completing_one_of_two_tasks_keeps_the_other() {
    init_logging();
    let (state, _) = start_single(AppState::new(), 1, "A");
    let (state, _) = start_single(state, 2, "B");

    let (state, effects) = poll(
        state,
        batch(vec![
            ("A", payload(TaskStatus::Completed)),
            ("B", payload(TaskStatus::Running)),
        ]),
    );

    assert_eq!(state.store(), &store_of(&[("B", 2)]));
    assert_eq!(
        effects,
        vec![
            Effect::PersistTasks(store_of(&[("B", 2)])),
            Effect::ScheduleReload {
                after: Duration::from_secs(1)
            },
        ]
    );
    assert!(state.poller().is_active());
}

#[test]
fn task_missing_from_response_stays_tracked() {
    init_logging();
    let (state, _) = start_single(AppState::new(), 1, "A");
    let (state, _) = start_single(state, 2, "B");

    let (state, effects) = poll(state, batch(vec![("B", payload(TaskStatus::Pending))]));

    assert!(effects.is_empty());
    assert_eq!(state.store(), &store_of(&[("A", 1), ("B", 2)]));
    assert_eq!(
        state.indicator(1),
        Some(&SingleIndicator::Queued {
            task_id: TaskId::new("A")
        })
    );
    assert_eq!(state.indicator(2), Some(&SingleIndicator::Pending));
}

#[test]
fn failed_task_unlocks_its_row_without_reload() {
    init_logging();
    let (state, _) = start_single(AppState::new(), 9, "A");
    assert!(!state.is_action_enabled(9));

    let (state, effects) = poll(state, batch(vec![("A", payload(TaskStatus::Failed))]));

    assert_eq!(
        effects,
        vec![Effect::PersistTasks(TaskStore::new()), Effect::StopPollTimer]
    );
    assert!(state.is_action_enabled(9));
    assert_eq!(state.indicator(9), Some(&SingleIndicator::Failed));
    assert!(!state.view().reload_pending);
    assert!(state.is_idle());
}

#[test]
fn several_completions_schedule_one_reload() {
    init_logging();
    let (state, _) = start_single(AppState::new(), 1, "A");
    let (state, _) = start_single(state, 2, "B");
    let (state, _) = start_single(state, 3, "C");

    let (state, effects) = poll(
        state,
        batch(vec![
            ("A", payload(TaskStatus::Completed)),
            ("B", payload(TaskStatus::Completed)),
            ("C", payload(TaskStatus::Running)),
        ]),
    );
    let reloads = effects
        .iter()
        .filter(|effect| matches!(effect, Effect::ScheduleReload { .. }))
        .count();
    assert_eq!(reloads, 1);

    let (_state, effects) = poll(state, batch(vec![("C", payload(TaskStatus::Completed))]));
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::ScheduleReload { .. })));
}

#[test]
fn tick_is_skipped_while_a_batch_is_in_flight() {
    init_logging();
    let (state, _) = start_single(AppState::new(), 1, "A");
    let (state, effects) = update(state, Msg::PollTick);
    assert_eq!(effects.len(), 1);

    let (state, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());
    assert!(state.poller().in_flight());
}

#[test]
fn failed_poll_is_swallowed_and_polling_continues() {
    init_logging();
    let (state, _) = start_single(AppState::new(), 1, "A");
    let (state, _) = update(state, Msg::PollTick);

    let (state, effects) = update(
        state,
        Msg::BatchStatusReceived(Err(RequestFailure::Server { status: 502 })),
    );
    assert!(effects.is_empty());
    assert!(state.poller().is_active());
    assert_eq!(state.store().len(), 1);

    let (_state, effects) = update(state, Msg::PollTick);
    assert_eq!(
        effects,
        vec![Effect::FetchBatchStatus {
            task_ids: vec![TaskId::new("A")]
        }]
    );
}

#[test]
fn expired_session_during_poll_reloads_only() {
    init_logging();
    let (state, _) = start_single(AppState::new(), 1, "A");
    let (state, _) = update(state, Msg::PollTick);

    let (state, effects) = update(
        state,
        Msg::BatchStatusReceived(Err(RequestFailure::AuthExpired)),
    );
    assert_eq!(
        effects,
        vec![Effect::Reload {
            reason: ReloadReason::SessionExpired
        }]
    );
    assert_eq!(state.store().len(), 1);
}

#[test]
fn stale_tick_after_polling_stopped_does_nothing() {
    init_logging();
    let (state, _) = start_single(AppState::new(), 1, "A");
    let (state, _) = poll(state, batch(vec![("A", payload(TaskStatus::Failed))]));
    assert!(!state.poller().is_active());

    let (_state, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());
}

#[test]
fn recovered_full_task_reports_progress_then_reloads() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::TasksRestored(TaskStore::new()));
    let (state, effects) = update(
        state,
        Msg::ActiveFullResolved(Ok(ActiveFullTask {
            task_id: Some(TaskId::new("F")),
            status: "running".to_string(),
        })),
    );
    assert_eq!(
        effects,
        vec![Effect::StartPollTimer {
            interval: Duration::from_secs(2)
        }]
    );
    assert!(state.view().crawl_running);

    let progress = TaskStatusPayload {
        status: TaskStatus::Running,
        progress_percentage: 42.5,
        processed_items: 17,
        total_items: 40,
        current_item: Some("Machu Picchu".to_string()),
    };
    let (state, effects) = poll(state, batch(vec![("F", progress)]));
    assert!(effects.is_empty());
    let full = state.view().full_progress.expect("full progress");
    assert_eq!(full.label(), "42.50% (17/40)");
    assert_eq!(full.current_item.as_deref(), Some("Machu Picchu"));
    assert_eq!(state.full_task().map(|t| t.processed_items), Some(17));

    let (state, effects) = poll(state, batch(vec![("F", payload(TaskStatus::Failed))]));
    assert_eq!(
        effects,
        vec![
            Effect::ScheduleReload {
                after: Duration::from_secs(1)
            },
            Effect::StopPollTimer,
        ]
    );
    assert!(state.full_task().is_none());
}

#[test]
fn full_task_is_polled_before_singles() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::StartFullClicked);
    let (state, _) = update(state, Msg::FullStarted(Ok(TaskId::new("F"))));
    let (state, _) = start_single(state, 5, "S");

    let (_state, effects) = update(state, Msg::PollTick);
    assert_eq!(
        effects,
        vec![Effect::FetchBatchStatus {
            task_ids: vec![TaskId::new("F"), TaskId::new("S")]
        }]
    );
}
