use crate::list_sync::{Highlight, SiteRecord, SiteUpdates};
use crate::{ActiveFullTask, BatchStatus, RequestFailure, SiteId, TaskId, TaskStore};

pub type RequestResult<T> = Result<T, RequestFailure>;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Tracked single tasks read back from storage at startup.
    TasksRestored(TaskStore),
    /// Rows currently shown in the site table.
    TableLoaded(Vec<SiteRecord>),
    /// Answer of the active-full lookup.
    ActiveFullResolved(RequestResult<ActiveFullTask>),
    /// User asked for a full crawl.
    StartFullClicked,
    FullStarted(RequestResult<TaskId>),
    /// User asked to update one site.
    StartSingleClicked { site_id: SiteId },
    SingleStarted {
        site_id: SiteId,
        result: RequestResult<TaskId>,
    },
    /// User asked to stop everything.
    StopAllClicked,
    /// `Ok(true)` when the service confirmed the stop.
    StopAllFinished(RequestResult<bool>),
    /// Poll timer fired.
    PollTick,
    BatchStatusReceived(RequestResult<BatchStatus>),
    /// Start following the site table without a full crawl.
    ListSyncRequested,
    /// List-sync timer fired.
    ListSyncTick,
    SiteUpdatesReceived(RequestResult<SiteUpdates>),
    HighlightExpired { site_id: SiteId, highlight: Highlight },
    /// Tear down timers before the state is dropped.
    Shutdown,
    /// Fallback for placeholder wiring.
    NoOp,
}
