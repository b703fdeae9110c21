use serde::{Deserialize, Serialize};
use tracker_core::{
    ActiveFullTask, BatchStatus, RequestResult, SiteId, SiteUpdates, TaskId,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct StartResponse {
    pub task_id: TaskId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct StopResponse {
    #[serde(default)]
    pub status: String,
}

impl StopResponse {
    pub fn is_stopped(&self) -> bool {
        self.status == "stopped"
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchRequest<'a> {
    pub task_ids: &'a [TaskId],
}

/// Work the engine performs against the job service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    ActiveFull,
    StartFull,
    StartSingle { site_id: SiteId },
    StopAll,
    BatchStatus { task_ids: Vec<TaskId> },
    SiteUpdates { since: Option<String> },
}

/// Answer to one `ApiRequest`.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ActiveFull(RequestResult<ActiveFullTask>),
    FullStarted(RequestResult<TaskId>),
    SingleStarted {
        site_id: SiteId,
        result: RequestResult<TaskId>,
    },
    StoppedAll(RequestResult<bool>),
    BatchStatus(RequestResult<BatchStatus>),
    SiteUpdates(RequestResult<SiteUpdates>),
}
