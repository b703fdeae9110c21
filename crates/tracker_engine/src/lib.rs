//! Tracker engine: job-service requests, timers, and durable storage.
mod client;
mod engine;
mod storage;
mod timer;
mod types;

pub use client::{classify, ClientSettings, JobService, ReqwestJobService};
pub use engine::{execute, ChannelEventSink, EngineError, EngineHandle, EventSink};
pub use storage::{ensure_state_dir, AtomicFileWriter, FileStore, StorageError};
pub use timer::{schedule_once, IntervalTimer, TickFn};
pub use types::{ApiRequest, EngineEvent};
pub use tokio_util::sync::CancellationToken;
pub use url::Url;
