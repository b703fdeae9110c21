//! Tracker core: pure task-tracking state machine and view-model helpers.
mod effect;
mod error;
pub mod list_sync;
mod msg;
mod reconcile;
mod scheduler;
mod state;
mod store;
mod task;
mod update;
mod view_model;

pub use effect::{Effect, ReloadReason};
pub use error::RequestFailure;
pub use list_sync::{Highlight, SiteRecord, SiteTable, SiteUpdates, SyncCursor};
pub use msg::{Msg, RequestResult};
pub use reconcile::{reconcile, Reconciliation, UiPatch};
pub use scheduler::{Ticker, TickerState, TimerChange};
pub use state::{AppState, Timing};
pub use store::{
    KeyValueStore, MemoryStore, StorageResult, TaskStore, TrackedTask, ACTIVE_TASKS_KEY,
};
pub use task::{
    ActiveFullTask, BatchStatus, SiteId, Task, TaskId, TaskKind, TaskStatus, TaskStatusPayload,
};
pub use update::update;
pub use view_model::{AppViewModel, FullProgressView, SingleIndicator, SingleTaskView, SiteRowView};
