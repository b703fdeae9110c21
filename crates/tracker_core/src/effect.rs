use std::time::Duration;

use crate::list_sync::Highlight;
use crate::{SiteId, TaskId, TaskStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchActiveFull,
    StartFull,
    StartSingle { site_id: SiteId },
    StopAll,
    FetchBatchStatus { task_ids: Vec<TaskId> },
    FetchSiteUpdates { since: Option<String> },
    /// Write the registry to durable storage now.
    PersistTasks(TaskStore),
    StartPollTimer { interval: Duration },
    StopPollTimer,
    StartListSync { interval: Duration },
    StopListSync,
    ScheduleHighlightClear {
        site_id: SiteId,
        highlight: Highlight,
        after: Duration,
    },
    ScheduleReload { after: Duration },
    Reload { reason: ReloadReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadReason {
    /// A task finished and the table data is stale.
    TaskFinished,
    SessionExpired,
    StoppedAll,
}
