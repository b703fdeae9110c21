use std::collections::HashMap;
use std::error::Error;
use std::sync::Mutex;

use engine_logging::{engine_debug, engine_error, engine_warn};
use serde::{Deserialize, Serialize};

use crate::{SiteId, TaskId};

/// Storage key holding the JSON list of tracked single tasks.
pub const ACTIVE_TASKS_KEY: &str = "active_tasks";

pub type StorageResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Durable string storage, last write wins.
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> StorageResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;
}

/// In-process store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        store
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "memory store lock poisoned")?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedTask {
    pub task_id: TaskId,
    pub site_id: SiteId,
}

/// Ordered registry of single tasks the client believes are outstanding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskStore {
    tasks: Vec<TrackedTask>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the persisted registry. Missing or corrupt data yields an empty store.
    pub fn load(storage: &dyn KeyValueStore) -> Self {
        let raw = match storage.read(ACTIVE_TASKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::new(),
            Err(err) => {
                engine_warn!("Failed to read tracked tasks: {}", err);
                return Self::new();
            }
        };
        Self::from_json(&raw)
    }

    /// Persistence is best effort; failures are logged and dropped.
    pub fn save(&self, storage: &dyn KeyValueStore) {
        let json = match serde_json::to_string(&self.tasks) {
            Ok(json) => json,
            Err(err) => {
                engine_error!("Failed to serialize tracked tasks: {}", err);
                return;
            }
        };
        if let Err(err) = storage.write(ACTIVE_TASKS_KEY, &json) {
            engine_error!("Failed to save tracked tasks: {}", err);
        }
    }

    pub fn from_json(raw: &str) -> Self {
        match serde_json::from_str::<Vec<TrackedTask>>(raw) {
            Ok(tasks) => {
                let mut store = Self::new();
                for task in tasks {
                    store.add(task.task_id, task.site_id);
                }
                engine_debug!("Restored {} tracked task(s)", store.len());
                store
            }
            Err(err) => {
                engine_warn!("Discarding malformed tracked tasks: {}", err);
                Self::new()
            }
        }
    }

    /// Appends a task. A repeated `task_id` is ignored and `false` returned.
    pub fn add(&mut self, task_id: TaskId, site_id: SiteId) -> bool {
        if self.contains(&task_id) {
            return false;
        }
        self.tasks.push(TrackedTask { task_id, site_id });
        true
    }

    pub fn remove(&mut self, task_id: &TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| &task.task_id != task_id);
        self.tasks.len() != before
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn all(&self) -> &[TrackedTask] {
        &self.tasks
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.tasks.iter().any(|task| &task.task_id == task_id)
    }

    pub fn contains_site(&self, site_id: SiteId) -> bool {
        self.tasks.iter().any(|task| task.site_id == site_id)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.iter().map(|task| &task.task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
