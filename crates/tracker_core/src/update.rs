use crate::{AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::TasksRestored(store) => state.restore_tasks(store),
        Msg::TableLoaded(records) => {
            state.load_table(records);
            Vec::new()
        }
        Msg::ActiveFullResolved(result) => state.resolve_active_full(result),
        Msg::StartFullClicked => state.begin_full_start(),
        Msg::FullStarted(result) => state.full_started(result),
        Msg::StartSingleClicked { site_id } => state.begin_single_start(site_id),
        Msg::SingleStarted { site_id, result } => state.single_started(site_id, result),
        Msg::StopAllClicked => state.begin_stop_all(),
        Msg::StopAllFinished(result) => state.stop_all_finished(result),
        Msg::PollTick => state.poll_tick(),
        Msg::BatchStatusReceived(result) => state.batch_received(result),
        Msg::ListSyncRequested => state.start_list_sync(),
        Msg::ListSyncTick => state.list_sync_tick(),
        Msg::SiteUpdatesReceived(result) => state.site_updates_received(result),
        Msg::HighlightExpired { site_id, highlight } => {
            state.highlight_expired(site_id, highlight);
            Vec::new()
        }
        Msg::Shutdown => state.shutdown(),
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
