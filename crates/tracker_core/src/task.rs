use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a remote crawl task.
///
/// The job service hands out integer ids but keys its batch responses by
/// string, so both JSON forms are accepted and the id is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<u64> for TaskId {
    fn from(raw: u64) -> Self {
        Self(raw.to_string())
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => TaskId::from(n),
            RawId::Text(s) => TaskId(s),
        })
    }
}

pub type SiteId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Full,
    Single,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Reported after a stop-all issued from another client.
    Stopped,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Stopped
        )
    }
}

/// One entry of a batch status response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskStatusPayload {
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress_percentage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub processed_items: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_items: u64,
    #[serde(default)]
    pub current_item: Option<String>,
}

impl TaskStatusPayload {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status,
            progress_percentage: 0.0,
            processed_items: 0,
            total_items: 0,
            current_item: None,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Batched answer of the status endpoint, keyed by task id.
pub type BatchStatus = BTreeMap<TaskId, TaskStatusPayload>;

/// Answer of the active-full lookup used to recover a full crawl after reload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActiveFullTask {
    pub task_id: Option<TaskId>,
    pub status: String,
}

impl ActiveFullTask {
    /// Only pending or running full tasks are adopted.
    pub fn adoptable_id(&self) -> Option<&TaskId> {
        match self.status.as_str() {
            "pending" | "running" => self.task_id.as_ref(),
            _ => None,
        }
    }
}

/// Full view of a tracked task, assembled from local knowledge and the last poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub site_id: Option<SiteId>,
    pub status: TaskStatus,
    pub progress_percentage: f64,
    pub processed_items: u64,
    pub total_items: u64,
    pub current_item: Option<String>,
}

impl Task {
    pub fn new(task_id: TaskId, kind: TaskKind, site_id: Option<SiteId>) -> Self {
        Self {
            task_id,
            kind,
            site_id,
            status: TaskStatus::Pending,
            progress_percentage: 0.0,
            processed_items: 0,
            total_items: 0,
            current_item: None,
        }
    }

    pub fn apply(&mut self, payload: &TaskStatusPayload) {
        self.status = payload.status.clone();
        self.progress_percentage = payload.progress_percentage.clamp(0.0, 100.0);
        self.processed_items = payload.processed_items;
        self.total_items = payload.total_items;
        self.current_item = payload.current_item.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_accepts_numbers_and_strings() {
        let ids: Vec<TaskId> = serde_json::from_str(r#"[7, "8"]"#).unwrap();
        assert_eq!(ids, vec![TaskId::from(7), TaskId::new("8")]);
    }

    #[test]
    fn payload_tolerates_nulls_and_unknown_status() {
        let payload: TaskStatusPayload = serde_json::from_str(
            r#"{"status": "exploding", "progress_percentage": null, "current_item": null}"#,
        )
        .unwrap();
        assert_eq!(payload.status, TaskStatus::Unknown);
        assert_eq!(payload.progress_percentage, 0.0);
        assert_eq!(payload.total_items, 0);
    }

    #[test]
    fn idle_active_full_is_not_adopted() {
        let idle: ActiveFullTask =
            serde_json::from_str(r#"{"task_id": null, "status": "idle"}"#).unwrap();
        assert_eq!(idle.adoptable_id(), None);

        let running: ActiveFullTask =
            serde_json::from_str(r#"{"task_id": 3, "status": "running"}"#).unwrap();
        assert_eq!(running.adoptable_id(), Some(&TaskId::from(3)));
    }
}
