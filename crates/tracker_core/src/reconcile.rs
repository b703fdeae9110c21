use engine_logging::engine_debug;

use crate::view_model::{FullProgressView, SingleIndicator};
use crate::{BatchStatus, SiteId, TaskId, TaskStatus, TrackedTask};

/// A change to apply to the progress display.
#[derive(Debug, Clone, PartialEq)]
pub enum UiPatch {
    FullProgress(FullProgressView),
    Single {
        site_id: SiteId,
        indicator: SingleIndicator,
    },
    /// The row's start control may be used again.
    EnableAction { site_id: SiteId },
}

/// Outcome of reconciling tracked tasks against one batch response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reconciliation {
    pub patches: Vec<UiPatch>,
    /// Single tasks that reached a terminal state and must leave the store.
    pub retired: Vec<TaskId>,
    pub full_finished: bool,
    pub reload: bool,
}

/// Decides what one batch response means for the tracked tasks.
///
/// Singles are visited from the end of the list backward, matching the
/// removal-safe order of the registry. Ids absent from `batch` are left alone.
pub fn reconcile(
    full: Option<&TaskId>,
    tracked: &[TrackedTask],
    batch: &BatchStatus,
) -> Reconciliation {
    let mut out = Reconciliation::default();

    if let Some(payload) = full.and_then(|id| batch.get(id)) {
        out.patches
            .push(UiPatch::FullProgress(FullProgressView::from_payload(payload)));
        if payload.status.is_terminal() {
            out.full_finished = true;
            out.reload = true;
        }
    }

    for task in tracked.iter().rev() {
        let Some(payload) = batch.get(&task.task_id) else {
            engine_debug!("Task {} missing from batch response", task.task_id);
            continue;
        };
        let site_id = task.site_id;
        let indicator = match payload.status {
            TaskStatus::Pending => SingleIndicator::Pending,
            TaskStatus::Running => SingleIndicator::Running {
                percentage: payload.progress_percentage.clamp(0.0, 100.0),
                processed_items: payload.processed_items,
                total_items: payload.total_items,
            },
            TaskStatus::Completed => {
                out.retired.push(task.task_id.clone());
                out.reload = true;
                SingleIndicator::Done
            }
            TaskStatus::Failed | TaskStatus::Stopped => {
                out.retired.push(task.task_id.clone());
                let indicator = if payload.status == TaskStatus::Failed {
                    SingleIndicator::Failed
                } else {
                    SingleIndicator::Stopped
                };
                out.patches.push(UiPatch::Single { site_id, indicator });
                out.patches.push(UiPatch::EnableAction { site_id });
                continue;
            }
            TaskStatus::Unknown => {
                engine_debug!("Task {} reported an unknown status", task.task_id);
                continue;
            }
        };
        out.patches.push(UiPatch::Single { site_id, indicator });
    }

    out
}
