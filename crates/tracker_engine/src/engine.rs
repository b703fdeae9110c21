use std::io;
use std::sync::{mpsc, Arc};

use engine_logging::engine_trace;
use tokio::runtime::{Handle, Runtime};

use crate::client::{ClientSettings, JobService, ReqwestJobService};
use crate::{ApiRequest, EngineEvent};
use tracker_core::RequestFailure;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] io::Error),
    #[error("failed to build http client: {0}")]
    Client(RequestFailure),
}

/// Receives the answers of submitted requests.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Owns the async runtime that executes requests and timers.
pub struct EngineHandle {
    runtime: Runtime,
    service: Arc<dyn JobService>,
}

impl EngineHandle {
    pub fn new(settings: ClientSettings) -> Result<Self, EngineError> {
        let service = ReqwestJobService::new(settings).map_err(EngineError::Client)?;
        Self::with_service(Arc::new(service))
    }

    pub fn with_service(service: Arc<dyn JobService>) -> Result<Self, EngineError> {
        let runtime = Runtime::new()?;
        Ok(Self { runtime, service })
    }

    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    /// Runs the request in the background; the answer goes to `sink`.
    pub fn submit(&self, request: ApiRequest, sink: Arc<dyn EventSink>) {
        let service = self.service.clone();
        self.runtime.spawn(async move {
            let event = execute(service.as_ref(), request).await;
            sink.emit(event);
        });
    }
}

pub async fn execute(service: &dyn JobService, request: ApiRequest) -> EngineEvent {
    engine_trace!("Executing {:?}", request);
    match request {
        ApiRequest::ActiveFull => EngineEvent::ActiveFull(service.active_full().await),
        ApiRequest::StartFull => EngineEvent::FullStarted(service.start_full().await),
        ApiRequest::StartSingle { site_id } => EngineEvent::SingleStarted {
            site_id,
            result: service.start_single(site_id).await,
        },
        ApiRequest::StopAll => EngineEvent::StoppedAll(service.stop_all().await),
        ApiRequest::BatchStatus { task_ids } => {
            EngineEvent::BatchStatus(service.batch_status(&task_ids).await)
        }
        ApiRequest::SiteUpdates { since } => {
            EngineEvent::SiteUpdates(service.updated_sites(since.as_deref()).await)
        }
    }
}
