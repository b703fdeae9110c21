use std::fs;

use tempfile::TempDir;
use tracker_core::{KeyValueStore, TaskId, TaskStore, ACTIVE_TASKS_KEY};
use tracker_engine::{ensure_state_dir, AtomicFileWriter, FileStore};

#[test]
fn creates_missing_state_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("state");
    assert!(!new_dir.exists());
    ensure_state_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("tasks.json", "[]").unwrap();
    assert_eq!(fs::read_to_string(&first).unwrap(), "[]");

    let second = writer.write("tasks.json", "[1]").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "[1]");
}

#[test]
fn state_dir_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let store = FileStore::new(file_path.clone());
    assert!(store.write(ACTIVE_TASKS_KEY, "[]").is_err());
    assert!(!file_path.with_file_name("active_tasks.json").exists());
}

#[test]
fn missing_key_reads_as_none() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().join("fresh"));
    assert_eq!(store.read(ACTIVE_TASKS_KEY).unwrap(), None);
}

#[test]
fn keys_cannot_escape_the_directory() {
    let temp = TempDir::new().unwrap();
    let store = FileStore::new(temp.path().to_path_buf());
    assert!(store.write("../outside", "x").is_err());
    assert!(store.read("").is_err());
}

#[test]
fn task_store_survives_a_restart() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("state");

    let mut tasks = TaskStore::new();
    tasks.add(TaskId::new("A"), 42);
    tasks.save(&FileStore::new(dir.clone()));

    assert_eq!(
        fs::read_to_string(dir.join("active_tasks.json")).unwrap(),
        r#"[{"taskId":"A","siteId":42}]"#
    );
    assert_eq!(TaskStore::load(&FileStore::new(dir)), tasks);
}

#[test]
fn corrupt_file_loads_as_empty() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("active_tasks.json"), "[{oops").unwrap();
    let store = FileStore::new(temp.path().to_path_buf());
    assert!(TaskStore::load(&store).is_empty());
}
