//! Local JSON file task store used for offline runs.
//!
//! Mirrors the REST backend's semantics: tasks are scoped to the token that
//! created them, lookups across owners answer 404, and status transitions
//! maintain `completed_at`. Owners are kept as SHA-256 digests of their
//! token, never the token itself.

use crate::error::AppError;
use crate::model::{NewTask, Task, TaskStatus, TaskUpdate};
use crate::storage::TaskStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Mutex;
use tracing::debug;

pub const SCHEMA_VERSION: u32 = 2;
const NOT_FOUND_BODY: &str = r#"{"detail":"Task not found"}"#;

#[derive(Debug, Serialize, Deserialize)]
struct StoredTasks {
    schema_version: u32,
    #[serde(default)]
    owners: Vec<String>,
    #[serde(default)]
    next_id: i64,
    tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskState {
    pub owners: Vec<String>,
    pub next_id: i64,
    pub tasks: Vec<Task>,
}

fn owner_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl TaskState {
    fn owner_id(&self, token: &str) -> Option<i64> {
        let digest = owner_digest(token);
        self.owners
            .iter()
            .position(|owner| *owner == digest)
            .map(|index| index as i64 + 1)
    }

    fn owner_id_or_register(&mut self, token: &str) -> i64 {
        match self.owner_id(token) {
            Some(id) => id,
            None => {
                self.owners.push(owner_digest(token));
                self.owners.len() as i64
            }
        }
    }

    fn position(&self, token: &str, id: i64) -> Result<usize, AppError> {
        let owner = self.owner_id(token);
        self.tasks
            .iter()
            .position(|task| task.id == id && owner.is_some() && task.owner_id == owner)
            .ok_or_else(|| AppError::remote(404, NOT_FOUND_BODY))
    }
}

pub fn load_state(path: &Path) -> Result<TaskState, AppError> {
    if !path.exists() {
        return Ok(TaskState::default());
    }

    let content = std::fs::read_to_string(path).map_err(|err| AppError::io(err.to_string()))?;
    let stored: StoredTasks =
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    if stored.schema_version != SCHEMA_VERSION {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    let max_id = stored.tasks.iter().map(|task| task.id).max().unwrap_or(0);
    Ok(TaskState {
        owners: stored.owners,
        next_id: stored.next_id.max(max_id + 1),
        tasks: stored.tasks,
    })
}

pub fn save_state(path: &Path, state: &TaskState) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let stored = StoredTasks {
        schema_version: SCHEMA_VERSION,
        owners: state.owners.clone(),
        next_id: state.next_id,
        tasks: state.tasks.clone(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    std::fs::write(path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions).map_err(|err| AppError::io(err.to_string()))?;
    }

    Ok(())
}

fn now_rfc3339() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

fn apply_update(task: &mut Task, update: &TaskUpdate, now: &str) {
    if let Some(title) = update.title.as_ref() {
        task.title = title.trim().to_string();
    }
    if let Some(description) = update.description.as_ref() {
        task.description = Some(description.clone());
    }
    if let Some(priority) = update.priority {
        task.priority = priority;
    }
    if let Some(due_date) = update.due_date.as_ref() {
        task.due_date = Some(due_date.clone());
    }
    if let Some(category) = update.category.as_ref() {
        task.category = Some(category.clone());
    }
    if let Some(is_recurring) = update.is_recurring {
        task.is_recurring = is_recurring;
        if !is_recurring {
            task.recurrence_pattern = None;
        }
    }
    if let Some(pattern) = update.recurrence_pattern {
        task.recurrence_pattern = Some(pattern);
    }
    if !task.is_recurring {
        task.recurrence_pattern = None;
    }
    if let Some(status) = update.status {
        task.status = status;
        task.completed_at = match status {
            TaskStatus::Completed => Some(now.to_string()),
            TaskStatus::Pending => None,
        };
    }
    task.updated_at = Some(now.to_string());
}

pub struct JsonTaskStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonTaskStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TaskStore for JsonTaskStore {
    async fn create(&self, token: &str, task: &NewTask) -> Result<Task, AppError> {
        task.validate()?;
        let _guard = self.lock.lock().await;

        let mut state = load_state(&self.path)?;
        let owner_id = state.owner_id_or_register(token);
        let now = now_rfc3339()?;
        let id = state.next_id.max(1);
        state.next_id = id + 1;

        let created = Task {
            id,
            title: task.title.trim().to_string(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            due_date: task.due_date.clone(),
            category: task.category.clone(),
            is_recurring: task.is_recurring,
            recurrence_pattern: task.recurrence_pattern,
            created_at: now.clone(),
            updated_at: None,
            completed_at: (task.status == TaskStatus::Completed).then_some(now),
            owner_id: Some(owner_id),
        };
        state.tasks.push(created.clone());
        save_state(&self.path, &state)?;

        debug!(task_id = id, "task created in local store");
        Ok(created)
    }

    async fn list(&self, token: &str) -> Result<Vec<Task>, AppError> {
        let _guard = self.lock.lock().await;
        let state = load_state(&self.path)?;
        let Some(owner) = state.owner_id(token) else {
            return Ok(Vec::new());
        };

        Ok(state
            .tasks
            .into_iter()
            .filter(|task| task.owner_id == Some(owner))
            .collect())
    }

    async fn get(&self, token: &str, id: i64) -> Result<Task, AppError> {
        let _guard = self.lock.lock().await;
        let state = load_state(&self.path)?;
        let index = state.position(token, id)?;
        Ok(state.tasks[index].clone())
    }

    async fn update(&self, token: &str, id: i64, update: &TaskUpdate) -> Result<Task, AppError> {
        update.validate()?;
        let _guard = self.lock.lock().await;

        let mut state = load_state(&self.path)?;
        let index = state.position(token, id)?;
        let now = now_rfc3339()?;
        apply_update(&mut state.tasks[index], update, &now);
        let updated = state.tasks[index].clone();
        save_state(&self.path, &state)?;

        Ok(updated)
    }

    async fn delete(&self, token: &str, id: i64) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;

        let mut state = load_state(&self.path)?;
        let index = state.position(token, id)?;
        state.tasks.remove(index);
        save_state(&self.path, &state)
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonTaskStore, SCHEMA_VERSION, load_state};
    use crate::model::{NewTask, Recurrence, TaskPriority, TaskStatus, TaskUpdate};
    use crate::storage::TaskStore;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("taskbot-{nanos}-{file_name}"))
    }

    #[tokio::test]
    async fn create_assigns_ids_and_persists() {
        let path = temp_path("create.json");
        let store = JsonTaskStore::new(&path);

        let first = store.create("alice", &NewTask::new(" Buy milk ")).await.unwrap();
        let second = store.create("alice", &NewTask::new("Walk dog")).await.unwrap();
        let state = load_state(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.title, "Buy milk");
        assert_eq!(first.status, TaskStatus::Pending);
        assert_eq!(first.completed_at, None);
        assert_eq!(state.tasks.len(), 2);
        assert_eq!(state.next_id, 3);
    }

    #[tokio::test]
    async fn create_rejects_blank_title_without_writing() {
        let path = temp_path("blank.json");
        let store = JsonTaskStore::new(&path);

        let err = store.create("alice", &NewTask::new("  ")).await.unwrap_err();

        assert_eq!(err.code(), "invalid_input");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn tasks_are_scoped_to_their_owner() {
        let path = temp_path("owners.json");
        let store = JsonTaskStore::new(&path);

        let task = store.create("alice", &NewTask::new("secret")).await.unwrap();
        let bob_tasks = store.list("bob").await.unwrap();
        let err = store.get("bob", task.id).await.unwrap_err();
        let alice_tasks = store.list("alice").await.unwrap();
        fs::remove_file(&path).ok();

        assert!(bob_tasks.is_empty());
        assert_eq!(err.code(), "remote_error");
        assert_eq!(err.message(), r#"{"detail":"Task not found"}"#);
        assert_eq!(alice_tasks.len(), 1);
    }

    #[tokio::test]
    async fn status_transitions_maintain_completed_at() {
        let path = temp_path("status.json");
        let store = JsonTaskStore::new(&path);
        let task = store.create("alice", &NewTask::new("ship")).await.unwrap();

        let done = store
            .update("alice", task.id, &TaskUpdate::status(TaskStatus::Completed))
            .await
            .unwrap();
        let reopened = store
            .update("alice", task.id, &TaskUpdate::status(TaskStatus::Pending))
            .await
            .unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.completed_at.is_some());
        assert!(done.updated_at.is_some());
        assert_eq!(reopened.status, TaskStatus::Pending);
        assert_eq!(reopened.completed_at, None);
    }

    #[tokio::test]
    async fn update_applies_only_given_fields() {
        let path = temp_path("partial.json");
        let store = JsonTaskStore::new(&path);
        let mut draft = NewTask::new("gym");
        draft.description = Some("leg day".into());
        let task = store.create("alice", &draft).await.unwrap();

        let update = TaskUpdate {
            priority: Some(TaskPriority::High),
            is_recurring: Some(true),
            recurrence_pattern: Some(Recurrence::Weekly),
            ..TaskUpdate::default()
        };
        let updated = store.update("alice", task.id, &update).await.unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(updated.title, "gym");
        assert_eq!(updated.description.as_deref(), Some("leg day"));
        assert_eq!(updated.priority, TaskPriority::High);
        assert!(updated.is_recurring);
        assert_eq!(updated.recurrence_pattern, Some(Recurrence::Weekly));
    }

    #[tokio::test]
    async fn owner_tokens_are_not_written_to_disk() {
        let path = temp_path("digest.json");
        let store = JsonTaskStore::new(&path);
        store
            .create("bearer-secret-123", &NewTask::new("private"))
            .await
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let listed = store.list("bearer-secret-123").await.unwrap();
        fs::remove_file(&path).ok();

        assert!(!content.contains("bearer-secret-123"));
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn turning_recurrence_off_clears_the_pattern() {
        let path = temp_path("recurrence.json");
        let store = JsonTaskStore::new(&path);
        let mut draft = NewTask::new("water plants");
        draft.is_recurring = true;
        draft.recurrence_pattern = Some(Recurrence::Weekly);
        let recurring = store.create("alice", &draft).await.unwrap();
        let plain = store.create("alice", &NewTask::new("call mom")).await.unwrap();

        let stopped = store
            .update(
                "alice",
                recurring.id,
                &TaskUpdate {
                    is_recurring: Some(false),
                    ..TaskUpdate::default()
                },
            )
            .await
            .unwrap();
        let untouched = store
            .update(
                "alice",
                plain.id,
                &TaskUpdate {
                    recurrence_pattern: Some(Recurrence::Daily),
                    ..TaskUpdate::default()
                },
            )
            .await
            .unwrap();
        fs::remove_file(&path).ok();

        assert!(!stopped.is_recurring);
        assert_eq!(stopped.recurrence_pattern, None);
        assert!(!untouched.is_recurring);
        assert_eq!(untouched.recurrence_pattern, None);
    }

    #[tokio::test]
    async fn delete_removes_task() {
        let path = temp_path("delete.json");
        let store = JsonTaskStore::new(&path);
        let task = store.create("alice", &NewTask::new("old")).await.unwrap();

        store.delete("alice", task.id).await.unwrap();
        let remaining = store.list("alice").await.unwrap();
        let err = store.delete("alice", task.id).await.unwrap_err();
        fs::remove_file(&path).ok();

        assert!(remaining.is_empty());
        assert_eq!(err.code(), "remote_error");
    }

    #[test]
    fn schema_version_must_match() {
        let path = temp_path("bad-schema.json");
        let bad = format!(
            "{{\n  \"schema_version\": {},\n  \"tasks\": []\n}}",
            SCHEMA_VERSION + 1
        );
        fs::write(&path, bad).unwrap();

        let err = load_state(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn load_state_repairs_next_id_from_tasks() {
        let path = temp_path("next-id.json");
        let content = "{\n  \"schema_version\": 2,\n  \"owners\": [\"2bd806c97f0e00af1a1fc3328fa763a9269723c8db8fac4f93af71db186d6e90\"],\n  \"tasks\": [\n    {\n      \"id\": 8,\n      \"title\": \"demo\",\n      \"status\": \"pending\",\n      \"created_at\": \"2025-12-20T00:00:00Z\",\n      \"owner_id\": 1\n    }\n  ]\n}";
        fs::write(&path, content).unwrap();

        let state = load_state(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(state.next_id, 9);
        assert_eq!(state.tasks[0].priority, TaskPriority::Medium);
    }
}
