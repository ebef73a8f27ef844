use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_pattern: Option<Recurrence>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(AppError::invalid_input(format!(
                "invalid status '{other}', expected pending or completed"
            ))),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(AppError::invalid_input(format!(
                "invalid priority '{other}', expected low, medium or high"
            ))),
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Low => "🟢",
            Self::Medium => "🟡",
            Self::High => "🔴",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(AppError::invalid_input(format!(
                "invalid recurrence '{other}', expected daily, weekly, monthly or yearly"
            ))),
        }
    }
}

/// Payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
    pub category: Option<String>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<Recurrence>,
}

impl NewTask {
    pub fn new<T: Into<String>>(title: T) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            due_date: None,
            category: None,
            is_recurring: false,
            recurrence_pattern: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::invalid_input("title is required"));
        }
        match (self.is_recurring, self.recurrence_pattern) {
            (true, None) => Err(AppError::invalid_input(
                "recurrence_pattern is required for recurring tasks",
            )),
            (false, Some(_)) => Err(AppError::invalid_input(
                "recurrence_pattern is only allowed for recurring tasks",
            )),
            _ => Ok(()),
        }
    }
}

/// Partial update: only the fields that are `Some` are sent to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_pattern: Option<Recurrence>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = self.title.as_deref()
            && title.trim().is_empty()
        {
            return Err(AppError::invalid_input("title cannot be blank"));
        }
        match (self.is_recurring, self.recurrence_pattern) {
            (Some(true), None) => Err(AppError::invalid_input(
                "recurrence_pattern is required for recurring tasks",
            )),
            (Some(false), Some(_)) => Err(AppError::invalid_input(
                "recurrence_pattern is only allowed for recurring tasks",
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NewTask, Recurrence, Task, TaskPriority, TaskStatus, TaskUpdate};

    #[test]
    fn task_deserializes_store_payload_with_defaults() {
        let payload = serde_json::json!({
            "id": 7,
            "title": "demo",
            "status": "pending",
            "created_at": "2025-12-20T00:00:00",
            "owner_id": 3
        });

        let task: Task = serde_json::from_value(payload).unwrap();

        assert_eq!(task.id, 7);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.description, None);
        assert!(!task.is_recurring);
        assert_eq!(task.completed_at, None);
        assert_eq!(task.owner_id, Some(3));
    }

    #[test]
    fn priority_parse_is_case_insensitive() {
        assert_eq!(TaskPriority::parse(" HIGH ").unwrap(), TaskPriority::High);
        assert_eq!(TaskPriority::parse("Low").unwrap(), TaskPriority::Low);
        assert_eq!(
            TaskPriority::parse("urgent").unwrap_err().code(),
            "invalid_input"
        );
    }

    #[test]
    fn status_parse_rejects_unknown_values() {
        assert_eq!(
            TaskStatus::parse("Completed").unwrap(),
            TaskStatus::Completed
        );
        assert!(TaskStatus::parse("archived").is_err());
    }

    #[test]
    fn new_task_requires_title() {
        let err = NewTask::new("   ").validate().unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn new_task_requires_pattern_iff_recurring() {
        let mut task = NewTask::new("water plants");
        task.is_recurring = true;
        assert!(task.validate().is_err());

        task.recurrence_pattern = Some(Recurrence::Weekly);
        assert!(task.validate().is_ok());

        task.is_recurring = false;
        assert!(task.validate().is_err());
    }

    #[test]
    fn task_update_serializes_only_set_fields() {
        let update = TaskUpdate::status(TaskStatus::Completed);
        let value = serde_json::to_value(&update).unwrap();

        assert_eq!(value, serde_json::json!({ "status": "completed" }));
        assert!(!update.is_empty());
        assert!(TaskUpdate::default().is_empty());
    }

    #[test]
    fn task_update_rejects_pattern_when_turning_recurrence_off() {
        let update = TaskUpdate {
            is_recurring: Some(false),
            recurrence_pattern: Some(Recurrence::Daily),
            ..TaskUpdate::default()
        };

        let err = update.validate().unwrap_err();

        assert_eq!(err.code(), "invalid_input");
        assert!(
            TaskUpdate {
                recurrence_pattern: Some(Recurrence::Daily),
                ..TaskUpdate::default()
            }
            .validate()
            .is_ok()
        );
    }
}
