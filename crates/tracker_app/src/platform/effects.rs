use std::sync::{mpsc, Arc};
use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use tracker_core::{Effect, KeyValueStore, Msg, ReloadReason};
use tracker_engine::{
    schedule_once, ApiRequest, CancellationToken, EngineEvent, EngineHandle, EventSink,
    IntervalTimer, TickFn,
};

/// What the event loop receives: state-machine messages, or a reload that a
/// delayed timer asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbox {
    Msg(Msg),
    Reload(ReloadReason),
}

/// Turns engine answers into messages for the current session's inbox.
struct MsgSink {
    tx: mpsc::Sender<Inbox>,
}

impl EventSink for MsgSink {
    fn emit(&self, event: EngineEvent) {
        // The receiver is gone after a reload; late answers are dropped.
        let _ = self.tx.send(Inbox::Msg(map_event(event)));
    }
}

fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::ActiveFull(result) => Msg::ActiveFullResolved(result),
        EngineEvent::FullStarted(result) => Msg::FullStarted(result),
        EngineEvent::SingleStarted { site_id, result } => Msg::SingleStarted { site_id, result },
        EngineEvent::StoppedAll(result) => Msg::StopAllFinished(result),
        EngineEvent::BatchStatus(result) => Msg::BatchStatusReceived(result),
        EngineEvent::SiteUpdates(result) => Msg::SiteUpdatesReceived(result),
    }
}

/// Executes effects emitted by `update`: requests go to the engine, timers run
/// on the engine's runtime, persistence goes to the key/value store.
pub struct EffectRunner {
    engine: EngineHandle,
    storage: Arc<dyn KeyValueStore>,
    tx: mpsc::Sender<Inbox>,
    sink: Arc<dyn EventSink>,
    poll_timer: IntervalTimer,
    list_timer: IntervalTimer,
    delayed: Vec<CancellationToken>,
}

impl EffectRunner {
    pub fn new(
        engine: EngineHandle,
        storage: Arc<dyn KeyValueStore>,
        tx: mpsc::Sender<Inbox>,
    ) -> Self {
        Self {
            engine,
            storage,
            sink: Arc::new(MsgSink { tx: tx.clone() }),
            tx,
            poll_timer: IntervalTimer::new(),
            list_timer: IntervalTimer::new(),
            delayed: Vec::new(),
        }
    }

    pub fn storage(&self) -> &dyn KeyValueStore {
        self.storage.as_ref()
    }

    /// Runs every effect in order. Returns the reload reason when one of them
    /// asked for an immediate reload.
    pub fn run(&mut self, effects: Vec<Effect>) -> Option<ReloadReason> {
        let mut reload = None;
        for effect in effects {
            match effect {
                Effect::FetchActiveFull => self.submit(ApiRequest::ActiveFull),
                Effect::StartFull => self.submit(ApiRequest::StartFull),
                Effect::StartSingle { site_id } => {
                    self.submit(ApiRequest::StartSingle { site_id })
                }
                Effect::StopAll => self.submit(ApiRequest::StopAll),
                Effect::FetchBatchStatus { task_ids } => {
                    engine_debug!("Polling {} task(s)", task_ids.len());
                    self.submit(ApiRequest::BatchStatus { task_ids });
                }
                Effect::FetchSiteUpdates { since } => {
                    self.submit(ApiRequest::SiteUpdates { since })
                }
                Effect::PersistTasks(store) => store.save(self.storage.as_ref()),
                Effect::StartPollTimer { interval } => {
                    let tick = self.ticker(Msg::PollTick);
                    self.poll_timer.start(&self.engine.handle(), interval, tick);
                }
                Effect::StopPollTimer => self.poll_timer.stop(),
                Effect::StartListSync { interval } => {
                    let tick = self.ticker(Msg::ListSyncTick);
                    self.list_timer.start(&self.engine.handle(), interval, tick);
                }
                Effect::StopListSync => self.list_timer.stop(),
                Effect::ScheduleHighlightClear {
                    site_id,
                    highlight,
                    after,
                } => {
                    let expired = Msg::HighlightExpired { site_id, highlight };
                    self.send_later(after, Inbox::Msg(expired));
                }
                Effect::ScheduleReload { after } => {
                    engine_info!("Reloading in {:?}", after);
                    self.send_later(after, Inbox::Reload(ReloadReason::TaskFinished));
                }
                Effect::Reload { reason } => reload = Some(reason),
            }
        }
        reload
    }

    /// Stops timers and pending delayed messages of the current session.
    pub fn teardown(&mut self) {
        self.poll_timer.stop();
        self.list_timer.stop();
        for token in self.delayed.drain(..) {
            token.cancel();
        }
    }

    /// Routes everything issued from now on to a fresh inbox.
    pub fn rebind(&mut self, tx: mpsc::Sender<Inbox>) {
        self.sink = Arc::new(MsgSink { tx: tx.clone() });
        self.tx = tx;
    }

    fn submit(&self, request: ApiRequest) {
        self.engine.submit(request, self.sink.clone());
    }

    fn ticker(&self, msg: Msg) -> TickFn {
        let tx = self.tx.clone();
        Arc::new(move || {
            let _ = tx.send(Inbox::Msg(msg.clone()));
        })
    }

    fn send_later(&mut self, after: Duration, item: Inbox) {
        self.delayed.retain(|token| !token.is_cancelled());
        let tx = self.tx.clone();
        let token = schedule_once(&self.engine.handle(), after, move || {
            let _ = tx.send(item);
        });
        self.delayed.push(token);
    }
}

impl Drop for EffectRunner {
    fn drop(&mut self) {
        self.teardown();
    }
}
