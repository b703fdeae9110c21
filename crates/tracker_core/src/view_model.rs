use crate::list_sync::Highlight;
use crate::{SiteId, TaskId, TaskStatusPayload};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FullProgressView {
    pub percentage: f64,
    pub processed_items: u64,
    pub total_items: u64,
    pub current_item: Option<String>,
}

impl FullProgressView {
    pub fn from_payload(payload: &TaskStatusPayload) -> Self {
        Self {
            percentage: payload.progress_percentage.clamp(0.0, 100.0),
            processed_items: payload.processed_items,
            total_items: payload.total_items,
            current_item: payload.current_item.clone(),
        }
    }

    /// e.g. `42.50% (17/40)`
    pub fn label(&self) -> String {
        format!(
            "{:.2}% ({}/{})",
            self.percentage, self.processed_items, self.total_items
        )
    }
}

/// Per-site progress indicator.
#[derive(Debug, Clone, PartialEq)]
pub enum SingleIndicator {
    Queuing,
    Resuming,
    Queued { task_id: TaskId },
    Pending,
    Running {
        percentage: f64,
        processed_items: u64,
        total_items: u64,
    },
    Done,
    Failed,
    Stopped,
}

impl SingleIndicator {
    pub fn label(&self) -> String {
        match self {
            SingleIndicator::Queuing => "Queuing...".to_string(),
            SingleIndicator::Resuming => "Resuming...".to_string(),
            SingleIndicator::Queued { task_id } => format!("Task Queued (ID: {task_id})"),
            SingleIndicator::Pending => "Pending...".to_string(),
            SingleIndicator::Running {
                percentage,
                processed_items,
                total_items,
            } => format!("Updating... {percentage:.0}% ({processed_items}/{total_items})"),
            SingleIndicator::Done => "Done!".to_string(),
            SingleIndicator::Failed => "Failed".to_string(),
            SingleIndicator::Stopped => "Stopped".to_string(),
        }
    }

    pub fn percentage(&self) -> f64 {
        match self {
            SingleIndicator::Running { percentage, .. } => *percentage,
            SingleIndicator::Done => 100.0,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleTaskView {
    pub site_id: SiteId,
    pub indicator: SingleIndicator,
    pub action_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRowView {
    pub site_id: SiteId,
    pub name: String,
    pub country: String,
    pub category: String,
    pub updated_at: String,
    pub highlight: Option<Highlight>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    /// Full crawl controls show "stop" instead of "start".
    pub crawl_running: bool,
    pub full_progress: Option<FullProgressView>,
    pub singles: Vec<SingleTaskView>,
    pub rows: Vec<SiteRowView>,
    pub total_count: Option<u64>,
    pub polling: bool,
    pub list_sync: bool,
    pub tracked_tasks: usize,
    pub reload_pending: bool,
    pub dirty: bool,
}
