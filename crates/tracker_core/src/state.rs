use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};

use crate::list_sync::{Highlight, SiteRecord, SiteTable, SiteUpdates, SyncCursor};
use crate::reconcile::{reconcile, UiPatch};
use crate::scheduler::{Ticker, TimerChange};
use crate::view_model::{
    AppViewModel, FullProgressView, SingleIndicator, SingleTaskView, SiteRowView,
};
use crate::{
    ActiveFullTask, BatchStatus, Effect, ReloadReason, RequestFailure, RequestResult, SiteId,
    Task, TaskId, TaskKind, TaskStore,
};

/// Delays the state machine hands to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub poll_interval: Duration,
    pub list_sync_interval: Duration,
    pub reload_grace: Duration,
    pub added_highlight: Duration,
    pub updated_highlight: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            list_sync_interval: Duration::from_secs(10),
            reload_grace: Duration::from_secs(1),
            added_highlight: Duration::from_secs(3),
            updated_highlight: Duration::from_secs(2),
        }
    }
}

/// Everything the controller knows between two messages. One instance per
/// session; a reload replaces it wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    timing: Timing,
    full_task: Option<Task>,
    full_progress: Option<FullProgressView>,
    crawl_running: bool,
    full_lookup_in_flight: bool,
    full_start_in_flight: bool,
    stop_in_flight: bool,
    store: TaskStore,
    starting_sites: BTreeSet<SiteId>,
    indicators: BTreeMap<SiteId, SingleIndicator>,
    disabled_actions: BTreeSet<SiteId>,
    poller: Ticker,
    list_sync: Ticker,
    cursor: SyncCursor,
    table: SiteTable,
    total_count: Option<u64>,
    reload_scheduled: bool,
    reloading: bool,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_timing(Timing::default())
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timing(timing: Timing) -> Self {
        Self {
            timing,
            full_task: None,
            full_progress: None,
            crawl_running: false,
            full_lookup_in_flight: false,
            full_start_in_flight: false,
            stop_in_flight: false,
            store: TaskStore::new(),
            starting_sites: BTreeSet::new(),
            indicators: BTreeMap::new(),
            disabled_actions: BTreeSet::new(),
            poller: Ticker::new(timing.poll_interval),
            list_sync: Ticker::new(timing.list_sync_interval),
            cursor: SyncCursor::default(),
            table: SiteTable::new(),
            total_count: None,
            reload_scheduled: false,
            reloading: false,
            dirty: false,
        }
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn full_task(&self) -> Option<&Task> {
        self.full_task.as_ref()
    }

    pub fn cursor(&self) -> &SyncCursor {
        &self.cursor
    }

    pub fn table(&self) -> &SiteTable {
        &self.table
    }

    pub fn poller(&self) -> &Ticker {
        &self.poller
    }

    pub fn list_sync(&self) -> &Ticker {
        &self.list_sync
    }

    pub fn indicator(&self, site_id: SiteId) -> Option<&SingleIndicator> {
        self.indicators.get(&site_id)
    }

    pub fn is_action_enabled(&self, site_id: SiteId) -> bool {
        !self.disabled_actions.contains(&site_id)
    }

    /// Nothing scheduled, nothing in flight.
    pub fn is_idle(&self) -> bool {
        !self.poller.is_active()
            && !self.list_sync.is_active()
            && !self.poller.in_flight()
            && !self.list_sync.in_flight()
            && !self.full_lookup_in_flight
            && !self.full_start_in_flight
            && !self.stop_in_flight
            && self.starting_sites.is_empty()
            && !self.reload_scheduled
            && !self.reloading
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            crawl_running: self.crawl_running,
            full_progress: self.full_progress.clone(),
            singles: self
                .indicators
                .iter()
                .map(|(site_id, indicator)| SingleTaskView {
                    site_id: *site_id,
                    indicator: indicator.clone(),
                    action_enabled: self.is_action_enabled(*site_id),
                })
                .collect(),
            rows: self
                .table
                .rows()
                .iter()
                .map(|row| SiteRowView {
                    site_id: row.site_id(),
                    name: row.record.name.clone(),
                    country: row.record.country.clone(),
                    category: row
                        .record
                        .category
                        .clone()
                        .filter(|c| !c.is_empty())
                        .unwrap_or_else(|| "-".to_string()),
                    updated_at: row
                        .updated
                        .map(|stamp| stamp.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    highlight: row.highlight,
                })
                .collect(),
            total_count: self.total_count,
            polling: self.poller.is_active(),
            list_sync: self.list_sync.is_active(),
            tracked_tasks: self.store.len() + usize::from(self.full_task.is_some()),
            reload_pending: self.reload_scheduled || self.reloading,
            dirty: self.dirty,
        }
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn has_poll_work(&self) -> bool {
        self.full_task.is_some() || !self.store.is_empty()
    }

    /// Starts or stops the poll timer to match the tracked work.
    pub(crate) fn evaluate_polling(&mut self) -> Vec<Effect> {
        let has_work = self.has_poll_work();
        match self.poller.evaluate(has_work) {
            Some(TimerChange::Start) => {
                engine_debug!("Polling started");
                self.mark_dirty();
                vec![Effect::StartPollTimer {
                    interval: self.poller.interval(),
                }]
            }
            Some(TimerChange::Stop) => {
                engine_debug!("Polling stopped, nothing left to track");
                self.mark_dirty();
                vec![Effect::StopPollTimer]
            }
            None => Vec::new(),
        }
    }

    fn request_reload(&mut self, reason: ReloadReason) -> Vec<Effect> {
        if self.reloading {
            return Vec::new();
        }
        self.reloading = true;
        self.mark_dirty();
        vec![Effect::Reload { reason }]
    }

    fn schedule_reload(&mut self) -> Vec<Effect> {
        if self.reload_scheduled || self.reloading {
            return Vec::new();
        }
        self.reload_scheduled = true;
        self.mark_dirty();
        vec![Effect::ScheduleReload {
            after: self.timing.reload_grace,
        }]
    }

    /// Shared answer to a failed request: a reload for an expired session,
    /// a log line otherwise.
    fn request_failed(&mut self, what: &str, failure: RequestFailure) -> Vec<Effect> {
        if failure.is_auth_expired() {
            return self.request_reload(ReloadReason::SessionExpired);
        }
        engine_error!("Failed to {}: {}", what, failure);
        Vec::new()
    }

    pub(crate) fn restore_tasks(&mut self, store: TaskStore) -> Vec<Effect> {
        for task in store.all() {
            self.disabled_actions.insert(task.site_id);
            self.indicators
                .insert(task.site_id, SingleIndicator::Resuming);
        }
        if !store.is_empty() {
            engine_info!("Resuming {} tracked task(s)", store.len());
        }
        self.store = store;
        self.full_lookup_in_flight = true;
        self.mark_dirty();

        let mut effects = vec![Effect::FetchActiveFull];
        effects.extend(self.evaluate_polling());
        effects
    }

    pub(crate) fn load_table(&mut self, records: Vec<SiteRecord>) {
        self.table = SiteTable::from_records(records);
        self.mark_dirty();
    }

    pub(crate) fn resolve_active_full(
        &mut self,
        result: RequestResult<ActiveFullTask>,
    ) -> Vec<Effect> {
        self.full_lookup_in_flight = false;
        match result {
            Ok(active) => {
                match active.adoptable_id() {
                    Some(task_id) if self.full_task.is_none() => {
                        engine_info!("Recovered running full crawl {}", task_id);
                        self.adopt_full_task(task_id.clone());
                    }
                    Some(_) => {}
                    None => self.crawl_running = self.full_task.is_some(),
                }
                self.mark_dirty();
            }
            Err(failure) => {
                let effects = self.request_failed("look up the active full crawl", failure);
                if !effects.is_empty() {
                    return effects;
                }
            }
        }
        self.evaluate_polling()
    }

    fn adopt_full_task(&mut self, task_id: TaskId) {
        self.full_task = Some(Task::new(task_id, TaskKind::Full, None));
        self.full_progress = Some(FullProgressView::default());
        self.crawl_running = true;
    }

    pub(crate) fn begin_full_start(&mut self) -> Vec<Effect> {
        if self.full_task.is_some() || self.full_start_in_flight {
            engine_debug!("Full crawl already tracked or starting; ignoring");
            return Vec::new();
        }
        self.full_start_in_flight = true;
        self.mark_dirty();
        vec![Effect::StartFull]
    }

    pub(crate) fn full_started(&mut self, result: RequestResult<TaskId>) -> Vec<Effect> {
        self.full_start_in_flight = false;
        self.mark_dirty();
        match result {
            Ok(task_id) => {
                engine_info!("Full crawl started as task {}", task_id);
                self.adopt_full_task(task_id);
                let mut effects = self.start_list_sync();
                effects.extend(self.evaluate_polling());
                effects
            }
            Err(failure) => {
                self.crawl_running = false;
                self.request_failed("start full crawl", failure)
            }
        }
    }

    pub(crate) fn begin_single_start(&mut self, site_id: SiteId) -> Vec<Effect> {
        if self.store.contains_site(site_id)
            || self.starting_sites.contains(&site_id)
            || self.disabled_actions.contains(&site_id)
        {
            engine_debug!("Site {} already has an active task; ignoring", site_id);
            return Vec::new();
        }
        self.starting_sites.insert(site_id);
        self.disabled_actions.insert(site_id);
        self.indicators.insert(site_id, SingleIndicator::Queuing);
        self.mark_dirty();
        vec![Effect::StartSingle { site_id }]
    }

    pub(crate) fn single_started(
        &mut self,
        site_id: SiteId,
        result: RequestResult<TaskId>,
    ) -> Vec<Effect> {
        self.starting_sites.remove(&site_id);
        self.mark_dirty();
        match result {
            Ok(task_id) => {
                engine_info!("Site {} queued as task {}", site_id, task_id);
                self.indicators.insert(
                    site_id,
                    SingleIndicator::Queued {
                        task_id: task_id.clone(),
                    },
                );
                let mut effects = Vec::new();
                if self.store.add(task_id, site_id) {
                    effects.push(Effect::PersistTasks(self.store.clone()));
                }
                effects.extend(self.evaluate_polling());
                effects
            }
            Err(failure) => {
                self.disabled_actions.remove(&site_id);
                self.indicators.remove(&site_id);
                self.request_failed("start single crawl", failure)
            }
        }
    }

    pub(crate) fn begin_stop_all(&mut self) -> Vec<Effect> {
        if self.stop_in_flight {
            return Vec::new();
        }
        self.stop_in_flight = true;
        vec![Effect::StopAll]
    }

    pub(crate) fn stop_all_finished(&mut self, result: RequestResult<bool>) -> Vec<Effect> {
        self.stop_in_flight = false;
        match result {
            Ok(true) => {
                engine_info!("All crawls stopped");
                self.full_task = None;
                self.full_progress = None;
                self.crawl_running = false;
                self.store.clear();
                self.indicators.clear();
                self.disabled_actions.clear();
                self.mark_dirty();

                let mut effects = vec![Effect::PersistTasks(self.store.clone())];
                if self.poller.halt().is_some() {
                    effects.push(Effect::StopPollTimer);
                }
                if self.list_sync.halt().is_some() {
                    effects.push(Effect::StopListSync);
                }
                effects.extend(self.request_reload(ReloadReason::StoppedAll));
                effects
            }
            Ok(false) => {
                engine_warn!("Stop request was not confirmed by the service");
                Vec::new()
            }
            Err(failure) => self.request_failed("stop crawls", failure),
        }
    }

    pub(crate) fn poll_tick(&mut self) -> Vec<Effect> {
        if !self.poller.is_active() {
            return Vec::new();
        }
        let mut task_ids: Vec<TaskId> = Vec::with_capacity(self.store.len() + 1);
        if let Some(full) = &self.full_task {
            task_ids.push(full.task_id.clone());
        }
        task_ids.extend(self.store.task_ids().cloned());

        if task_ids.is_empty() {
            return self.evaluate_polling();
        }
        if !self.poller.begin_tick() {
            engine_debug!("Batch status request still in flight; skipping tick");
            return Vec::new();
        }
        vec![Effect::FetchBatchStatus { task_ids }]
    }

    pub(crate) fn batch_received(&mut self, result: RequestResult<BatchStatus>) -> Vec<Effect> {
        self.poller.finish_tick();
        let mut effects = match result {
            Ok(batch) => self.apply_batch(&batch),
            Err(failure) if failure.is_auth_expired() => {
                return self.request_reload(ReloadReason::SessionExpired);
            }
            Err(failure) => {
                engine_warn!("Batch status poll failed: {}", failure);
                Vec::new()
            }
        };
        effects.extend(self.evaluate_polling());
        effects
    }

    fn apply_batch(&mut self, batch: &BatchStatus) -> Vec<Effect> {
        let full_id = self.full_task.as_ref().map(|task| task.task_id.clone());
        let outcome = reconcile(full_id.as_ref(), self.store.all(), batch);

        if let Some(task) = self.full_task.as_mut() {
            if let Some(payload) = batch.get(&task.task_id) {
                task.apply(payload);
            }
        }
        for patch in outcome.patches {
            match patch {
                UiPatch::FullProgress(progress) => self.full_progress = Some(progress),
                UiPatch::Single { site_id, indicator } => {
                    self.indicators.insert(site_id, indicator);
                }
                UiPatch::EnableAction { site_id } => {
                    self.disabled_actions.remove(&site_id);
                }
            }
            self.mark_dirty();
        }

        let mut effects = Vec::new();
        if outcome.full_finished {
            if let Some(task) = self.full_task.take() {
                engine_info!("Full crawl {} finished: {:?}", task.task_id, task.status);
            }
            self.mark_dirty();
        }
        if !outcome.retired.is_empty() {
            for task_id in &outcome.retired {
                self.store.remove(task_id);
            }
            engine_info!("Retired {} single task(s)", outcome.retired.len());
            effects.push(Effect::PersistTasks(self.store.clone()));
            self.mark_dirty();
        }
        if outcome.reload {
            effects.extend(self.schedule_reload());
        }
        effects
    }

    pub(crate) fn start_list_sync(&mut self) -> Vec<Effect> {
        if self.list_sync.evaluate(true) != Some(TimerChange::Start) {
            return Vec::new();
        }
        engine_debug!("List sync started");
        self.mark_dirty();
        let mut effects = vec![Effect::StartListSync {
            interval: self.list_sync.interval(),
        }];
        effects.extend(self.list_sync_tick());
        effects
    }

    pub(crate) fn list_sync_tick(&mut self) -> Vec<Effect> {
        if !self.list_sync.is_active() {
            return Vec::new();
        }
        if !self.list_sync.begin_tick() {
            engine_debug!("Site update fetch still in flight; skipping tick");
            return Vec::new();
        }
        vec![Effect::FetchSiteUpdates {
            since: self.cursor.since().map(str::to_string),
        }]
    }

    pub(crate) fn site_updates_received(
        &mut self,
        result: RequestResult<SiteUpdates>,
    ) -> Vec<Effect> {
        self.list_sync.finish_tick();
        let updates = match result {
            Ok(updates) => updates,
            Err(failure) if failure.is_auth_expired() => {
                return self.request_reload(ReloadReason::SessionExpired);
            }
            Err(failure) => {
                engine_warn!("Site update fetch failed: {}", failure);
                return Vec::new();
            }
        };

        self.total_count = Some(updates.total_count);
        self.mark_dirty();
        let changes = self.table.merge(updates.updated_sites);
        if !changes.is_empty() {
            engine_info!("Merged {} updated site(s)", changes.len());
        }
        self.cursor.advance(updates.server_time);

        changes
            .into_iter()
            .map(|change| Effect::ScheduleHighlightClear {
                site_id: change.site_id,
                highlight: change.highlight,
                after: match change.highlight {
                    Highlight::Added => self.timing.added_highlight,
                    Highlight::Updated => self.timing.updated_highlight,
                },
            })
            .collect()
    }

    pub(crate) fn highlight_expired(&mut self, site_id: SiteId, highlight: Highlight) {
        if self.table.clear_highlight(site_id, highlight) {
            self.mark_dirty();
        }
    }

    pub(crate) fn shutdown(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.poller.halt().is_some() {
            effects.push(Effect::StopPollTimer);
        }
        if self.list_sync.halt().is_some() {
            effects.push(Effect::StopListSync);
        }
        effects
    }
}
