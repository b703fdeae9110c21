use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickerState {
    #[default]
    Idle,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerChange {
    Start,
    Stop,
}

/// Bookkeeping for one repeating timer: whether it runs and whether the
/// request issued by its last tick is still outstanding.
///
/// The actual timer lives in the runtime; this only decides when it should
/// be started or stopped and whether a tick may issue a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticker {
    interval: Duration,
    state: TickerState,
    in_flight: bool,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: TickerState::Idle,
            in_flight: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> TickerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TickerState::Active
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Moves to `Active` when there is work and to `Idle` when there is none.
    /// Returns the timer change the runtime must perform, if any.
    pub fn evaluate(&mut self, has_work: bool) -> Option<TimerChange> {
        match (self.state, has_work) {
            (TickerState::Idle, true) => {
                self.state = TickerState::Active;
                Some(TimerChange::Start)
            }
            (TickerState::Active, false) => {
                self.state = TickerState::Idle;
                Some(TimerChange::Stop)
            }
            _ => None,
        }
    }

    /// Claims the in-flight slot. `false` means the tick must be skipped.
    pub fn begin_tick(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn finish_tick(&mut self) {
        self.in_flight = false;
    }

    /// Forces `Idle`, e.g. on stop-all. The in-flight flag is kept so a late
    /// response is still accounted for.
    pub fn halt(&mut self) -> Option<TimerChange> {
        self.evaluate(false)
    }
}
