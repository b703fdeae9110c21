use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub type TickFn = Arc<dyn Fn() + Send + Sync>;

/// Repeating timer with an explicit start/stop contract.
///
/// The first tick fires one `period` after `start`. Ticks missed while the
/// callback's consumer is busy are dropped, not bunched up.
#[derive(Default)]
pub struct IntervalTimer {
    token: Option<CancellationToken>,
}

impl IntervalTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.token.is_some()
    }

    /// Restarts the timer if it is already running.
    pub fn start(&mut self, runtime: &Handle, period: Duration, on_tick: TickFn) {
        self.stop();
        let token = CancellationToken::new();
        let cancelled = token.clone();
        runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => on_tick(),
                }
            }
        });
        self.token = Some(token);
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs `on_fire` once after `delay` unless the returned token is cancelled.
pub fn schedule_once<F>(runtime: &Handle, delay: Duration, on_fire: F) -> CancellationToken
where
    F: FnOnce() + Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();
    runtime.spawn(async move {
        tokio::select! {
            _ = cancelled.cancelled() => {}
            _ = time::sleep(delay) => on_fire(),
        }
    });
    token
}
