use std::io::{self, Write};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::{bail, Context};
use engine_logging::{engine_debug, engine_info, engine_warn};
use tracker_core::{update, AppState, Msg, ReloadReason, TaskStore, Timing};
use tracker_engine::{ensure_state_dir, EngineHandle, FileStore};

use super::config::AppConfig;
use super::effects::{EffectRunner, Inbox};
use super::render;

/// How long the loop waits for a message before re-checking for idleness.
const IDLE_CHECK: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Follow the site table from the first session on.
    pub list_sync: bool,
    /// Keep running once nothing is left to track.
    pub follow: bool,
    /// User commands issued once the first session has looked up the full crawl.
    pub commands: Vec<Msg>,
}

/// Counts back-to-back reloads caused by an expired session.
#[derive(Debug, Default)]
struct ReloadGuard {
    expired_in_a_row: u32,
}

impl ReloadGuard {
    fn record(&mut self, msg: &Msg) {
        if is_success(msg) {
            self.expired_in_a_row = 0;
        }
    }

    /// `false` when the session expired again without any successful answer
    /// since the last reload.
    fn allow(&mut self, reason: ReloadReason) -> bool {
        if reason != ReloadReason::SessionExpired {
            return true;
        }
        self.expired_in_a_row += 1;
        self.expired_in_a_row < 2
    }
}

fn is_success(msg: &Msg) -> bool {
    matches!(
        msg,
        Msg::ActiveFullResolved(Ok(_))
            | Msg::FullStarted(Ok(_))
            | Msg::SingleStarted { result: Ok(_), .. }
            | Msg::StopAllFinished(Ok(_))
            | Msg::BatchStatusReceived(Ok(_))
            | Msg::SiteUpdatesReceived(Ok(_))
    )
}

struct App {
    timing: Timing,
    runner: EffectRunner,
    rx: mpsc::Receiver<Inbox>,
    state: AppState,
    list_sync: bool,
    guard: ReloadGuard,
    commands: Option<Vec<Msg>>,
    sessions: u32,
}

impl App {
    /// Starts a fresh session: new inbox, new state, tasks read back from storage.
    fn initialize(&mut self) {
        let (tx, rx) = mpsc::channel();
        self.runner.rebind(tx);
        self.rx = rx;
        self.state = AppState::with_timing(self.timing);
        self.sessions += 1;
        engine_debug!("Session {} starting", self.sessions);

        let store = TaskStore::load(self.runner.storage());
        self.dispatch(Msg::TasksRestored(store));
        if self.list_sync {
            self.dispatch(Msg::ListSyncRequested);
        }
    }

    /// Runs one message through `update`; returns a requested reload.
    fn dispatch(&mut self, msg: Msg) -> Option<ReloadReason> {
        self.guard.record(&msg);
        let release_commands = matches!(msg, Msg::ActiveFullResolved(_));

        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            print_view(&state);
        }
        self.state = state;
        let mut reload = self.runner.run(effects);

        if release_commands && reload.is_none() {
            for command in self.commands.take().unwrap_or_default() {
                reload = reload.or(self.dispatch(command));
            }
        }
        reload
    }

    fn reload(&mut self, reason: ReloadReason) -> anyhow::Result<()> {
        if !self.guard.allow(reason) {
            bail!("session expired again right after a reload; refresh the session cookie");
        }
        engine_info!("Reloading ({:?})", reason);
        // Timers of the old session must not feed the new one.
        self.runner.teardown();
        self.initialize();
        Ok(())
    }

    fn handle(&mut self, item: Inbox) -> anyhow::Result<()> {
        let reload = match item {
            Inbox::Msg(msg) => self.dispatch(msg),
            Inbox::Reload(reason) => Some(reason),
        };
        match reload {
            Some(reason) => self.reload(reason),
            None => Ok(()),
        }
    }

    fn finished(&self, follow: bool) -> bool {
        !follow && self.commands.is_none() && self.state.is_idle()
    }
}

pub fn run(config: &AppConfig, options: RunOptions) -> anyhow::Result<()> {
    let settings = config.client_settings()?;
    ensure_state_dir(&config.state_dir)
        .with_context(|| format!("state directory {:?}", config.state_dir))?;
    let storage = Arc::new(FileStore::new(config.state_dir.clone()));
    let engine = EngineHandle::new(settings)?;

    let (tx, rx) = mpsc::channel();
    let mut app = App {
        timing: config.timing(),
        runner: EffectRunner::new(engine, storage, tx),
        rx,
        state: AppState::new(),
        list_sync: options.list_sync,
        guard: ReloadGuard::default(),
        commands: Some(options.commands),
        sessions: 0,
    };
    engine_info!("Tracking crawl tasks at {}", config.base_url);
    app.initialize();

    loop {
        match app.rx.recv_timeout(IDLE_CHECK) {
            Ok(item) => app.handle(item)?,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                engine_warn!("Message channel closed");
                break;
            }
        }
        if app.finished(options.follow) {
            engine_info!("Nothing left to track");
            break;
        }
    }

    let effects = {
        let state = std::mem::take(&mut app.state);
        let (state, effects) = update(state, Msg::Shutdown);
        app.state = state;
        effects
    };
    app.runner.run(effects);
    app.runner.teardown();
    Ok(())
}

fn print_view(state: &AppState) {
    let lines = render::render(&state.view());
    let mut out = io::stdout().lock();
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::{RequestFailure, TaskId};

    #[test]
    fn second_expired_session_in_a_row_is_refused() {
        let mut guard = ReloadGuard::default();
        assert!(guard.allow(ReloadReason::SessionExpired));
        assert!(!guard.allow(ReloadReason::SessionExpired));
    }

    #[test]
    fn a_successful_answer_resets_the_guard() {
        let mut guard = ReloadGuard::default();
        assert!(guard.allow(ReloadReason::SessionExpired));
        guard.record(&Msg::ActiveFullResolved(Err(RequestFailure::AuthExpired)));
        guard.record(&Msg::PollTick);
        guard.record(&Msg::FullStarted(Ok(TaskId::from(3))));
        assert!(guard.allow(ReloadReason::SessionExpired));
    }

    #[test]
    fn other_reloads_are_always_allowed() {
        let mut guard = ReloadGuard::default();
        assert!(guard.allow(ReloadReason::SessionExpired));
        assert!(guard.allow(ReloadReason::TaskFinished));
        assert!(guard.allow(ReloadReason::StoppedAll));
    }
}
