//! Task operations shaped for LLM tool-calling runtimes.
//!
//! Every tool takes scalar arguments plus an explicit auth token and always
//! returns one human-readable string. Failures are rendered into that string
//! instead of escaping the tool.

use crate::error::AppError;
use crate::model::{NewTask, Task, TaskPriority, TaskStatus, TaskUpdate};
use crate::storage::TaskStore;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, warn};

pub const AUTH_REQUIRED: &str = "Error: Authentication token is required. Please log in first.";
pub const NO_TASKS: &str = "📋 You don't have any tasks yet. Create your first task!";

#[derive(Debug, Clone, Copy)]
pub(crate) enum Op {
    Create,
    List,
    Get,
    Update,
    MarkCompleted,
    Delete,
    Search,
}

impl Op {
    fn verb(self) -> &'static str {
        match self {
            Self::Create => "create task",
            Self::List => "list tasks",
            Self::Get => "get task",
            Self::Update => "update task",
            Self::MarkCompleted => "mark task as completed",
            Self::Delete => "delete task",
            Self::Search => "search tasks",
        }
    }

    fn gerund(self) -> &'static str {
        match self {
            Self::Create => "creating task",
            Self::List => "listing tasks",
            Self::Get => "getting task",
            Self::Update => "updating task",
            Self::MarkCompleted => "marking task as completed",
            Self::Delete => "deleting task",
            Self::Search => "searching tasks",
        }
    }
}

pub(crate) fn failure(op: Op, err: &AppError) -> String {
    warn!(operation = op.verb(), code = err.code(), "tool call failed");
    match err {
        AppError::AuthenticationMissing(_) => AUTH_REQUIRED.to_string(),
        AppError::InvalidInput(message) => format!("❌ Cannot {}: {message}", op.verb()),
        AppError::Remote { body, .. } => format!("❌ Failed to {}: {body}", op.verb()),
        other => format!("Error {}: {}", op.gerund(), other.message()),
    }
}

fn render(op: Op, result: Result<String, AppError>) -> String {
    result.unwrap_or_else(|err| failure(op, &err))
}

fn require_token(token: &str) -> Result<(), AppError> {
    if token.trim().is_empty() {
        return Err(AppError::authentication_missing());
    }
    Ok(())
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Accepts `YYYY-MM-DD` (sent as midnight), `YYYY-MM-DDTHH:MM:SS` or RFC3339.
pub fn normalize_due_date(raw: &str) -> Result<Option<String>, AppError> {
    let Some(value) = optional(raw) else {
        return Ok(None);
    };

    let date_only = format_description!("[year]-[month]-[day]");
    if let Ok(date) = Date::parse(&value, date_only) {
        return Ok(Some(format!("{date}T00:00:00")));
    }

    let date_time = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if PrimitiveDateTime::parse(&value, date_time).is_ok()
        || OffsetDateTime::parse(&value, &Rfc3339).is_ok()
    {
        return Ok(Some(value));
    }

    Err(AppError::invalid_input(format!(
        "due date '{value}' must be YYYY-MM-DD or an ISO date-time"
    )))
}

/// Builds a create payload from free-text fields. Empty strings mean "not
/// given"; priority defaults to medium.
pub fn new_task_from_text(
    title: &str,
    description: &str,
    priority: &str,
    due_date: &str,
    category: &str,
) -> Result<NewTask, AppError> {
    let mut task = NewTask::new(title.trim());
    task.description = optional(description);
    task.priority = match optional(priority) {
        Some(value) => TaskPriority::parse(&value)?,
        None => TaskPriority::Medium,
    };
    task.due_date = normalize_due_date(due_date)?;
    task.category = optional(category);
    task.validate()?;
    Ok(task)
}

/// Partial update from free-text fields; only non-empty ones are set.
pub fn update_from_text(
    title: &str,
    description: &str,
    status: &str,
    priority: &str,
    due_date: &str,
    category: &str,
) -> Result<TaskUpdate, AppError> {
    Ok(TaskUpdate {
        title: optional(title),
        description: optional(description),
        status: optional(status)
            .map(|value| TaskStatus::parse(&value))
            .transpose()?,
        priority: optional(priority)
            .map(|value| TaskPriority::parse(&value))
            .transpose()?,
        due_date: normalize_due_date(due_date)?,
        category: optional(category),
        ..TaskUpdate::default()
    })
}

pub fn format_created(task: &Task) -> String {
    format!(
        "✅ Task created successfully!\n📝 Title: {}\n🏷️ Priority: {}\n📌 Status: {}\n🆔 Task ID: {}",
        task.title, task.priority, task.status, task.id
    )
}

pub fn format_updated(task: &Task) -> String {
    format!(
        "✅ Task updated successfully!\n📝 Title: {}\n📌 Status: {}\n🏷️ Priority: {}",
        task.title, task.status, task.priority
    )
}

pub fn format_completed(task: &Task) -> String {
    format!(
        "✅ Task #{} \"{}\" marked as completed successfully! Great job!",
        task.id, task.title
    )
}

pub fn format_deleted(id: i64) -> String {
    format!("✅ Task #{id} deleted successfully!")
}

/// Counts first, then pending items, then completed items. Store order is
/// kept inside each group.
pub fn format_task_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return NO_TASKS.to_string();
    }

    let (pending, completed): (Vec<&Task>, Vec<&Task>) = tasks
        .iter()
        .partition(|task| task.status == TaskStatus::Pending);

    let mut lines = vec![format!(
        "📊 Task Summary: {} pending, {} completed",
        pending.len(),
        completed.len()
    )];

    if !pending.is_empty() {
        lines.push(String::new());
        lines.push("⏳ Pending Tasks:".to_string());
        for (index, task) in pending.iter().enumerate() {
            let due = task
                .due_date
                .as_deref()
                .map(|due| format!(" (Due: {due})"))
                .unwrap_or_default();
            lines.push(format!(
                "  {}. {} {} - {} [#{}]{}",
                index + 1,
                task.priority.icon(),
                task.title,
                task.priority,
                task.id,
                due
            ));
        }
    }

    if !completed.is_empty() {
        lines.push(String::new());
        lines.push("✅ Completed Tasks:".to_string());
        for (index, task) in completed.iter().enumerate() {
            lines.push(format!("  {}. ✓ {} [#{}]", index + 1, task.title, task.id));
        }
    }

    lines.join("\n")
}

pub fn format_task_details(task: &Task) -> String {
    let status_icon = if task.status == TaskStatus::Completed {
        "✅"
    } else {
        "⏳"
    };
    let mut lines = vec![
        "📌 Task Details:".to_string(),
        format!("🆔 ID: {}", task.id),
        format!("📝 Title: {}", task.title),
        format!(
            "📖 Description: {}",
            task.description.as_deref().unwrap_or("No description")
        ),
        format!("{status_icon} Status: {}", task.status),
        format!("{} Priority: {}", task.priority.icon(), task.priority),
        format!(
            "🏷️ Category: {}",
            task.category.as_deref().unwrap_or("Not set")
        ),
        format!("📅 Created: {}", task.created_at),
    ];
    if let Some(due) = task.due_date.as_deref() {
        lines.push(format!("⏰ Due Date: {due}"));
    }
    if let Some(pattern) = task.recurrence_pattern.filter(|_| task.is_recurring) {
        lines.push(format!("🔁 Repeats: {}", serde_label(&pattern)));
    }
    if let Some(completed_at) = task.completed_at.as_deref() {
        lines.push(format!("✅ Completed: {completed_at}"));
    }
    lines.join("\n")
}

fn serde_label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}

pub fn format_search_results(category: &str, tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return format!("📋 No tasks found in category '{category}'.");
    }

    let mut lines = vec![format!("📋 Tasks in category '{category}':")];
    for (index, task) in tasks.iter().enumerate() {
        let status_icon = if task.status == TaskStatus::Completed {
            "✅"
        } else {
            "⏳"
        };
        lines.push(format!(
            "  {}. {} {} {} - {} [#{}]",
            index + 1,
            status_icon,
            task.priority.icon(),
            task.title,
            task.priority,
            task.id
        ));
    }
    lines.join("\n")
}

/// Function-calling schema for one tool. The auth token is supplied by the
/// runtime and is not part of the model-facing parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Clone)]
pub struct ToolAdapter {
    store: Arc<dyn TaskStore>,
}

impl ToolAdapter {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    // Typed paths shared by the dialogue engine and the CLI. Same checks as
    // the string tools, but failures stay as `AppError`.

    pub async fn submit(&self, token: &str, task: &NewTask) -> Result<Task, AppError> {
        require_token(token)?;
        task.validate()?;
        self.store.create(token, task).await
    }

    pub async fn fetch_all(&self, token: &str) -> Result<Vec<Task>, AppError> {
        require_token(token)?;
        self.store.list(token).await
    }

    pub async fn apply_update(
        &self,
        token: &str,
        id: i64,
        update: &TaskUpdate,
    ) -> Result<Task, AppError> {
        require_token(token)?;
        if update.is_empty() {
            return Err(AppError::invalid_input("no fields to update"));
        }
        update.validate()?;
        self.store.update(token, id, update).await
    }

    pub async fn fetch(&self, token: &str, id: i64) -> Result<Task, AppError> {
        require_token(token)?;
        self.store.get(token, id).await
    }

    pub async fn remove(&self, token: &str, id: i64) -> Result<(), AppError> {
        require_token(token)?;
        self.store.delete(token, id).await
    }

    /// Case-insensitive category match over the owner's tasks.
    pub async fn search(&self, token: &str, category: &str) -> Result<Vec<Task>, AppError> {
        require_token(token)?;
        let wanted = category.trim();
        if wanted.is_empty() {
            return Err(AppError::invalid_input("category is required"));
        }
        let tasks = self.store.list(token).await?;
        Ok(tasks
            .into_iter()
            .filter(|task| {
                task.category
                    .as_deref()
                    .is_some_and(|value| value.eq_ignore_ascii_case(wanted))
            })
            .collect())
    }

    pub async fn create_task(
        &self,
        title: &str,
        description: &str,
        priority: &str,
        due_date: &str,
        category: &str,
        auth_token: &str,
    ) -> String {
        debug!(tool = "create_task", "tool call");
        let result = async {
            require_token(auth_token)?;
            let task = new_task_from_text(title, description, priority, due_date, category)?;
            let created = self.submit(auth_token, &task).await?;
            Ok(format_created(&created))
        }
        .await;
        render(Op::Create, result)
    }

    pub async fn list_tasks(&self, auth_token: &str) -> String {
        debug!(tool = "list_tasks", "tool call");
        let result = self
            .fetch_all(auth_token)
            .await
            .map(|tasks| format_task_list(&tasks));
        render(Op::List, result)
    }

    pub async fn get_task(&self, task_id: i64, auth_token: &str) -> String {
        debug!(tool = "get_task", task_id, "tool call");
        let result = self
            .fetch(auth_token, task_id)
            .await
            .map(|task| format_task_details(&task));
        render(Op::Get, result)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_task(
        &self,
        task_id: i64,
        title: &str,
        description: &str,
        status: &str,
        priority: &str,
        due_date: &str,
        category: &str,
        auth_token: &str,
    ) -> String {
        debug!(tool = "update_task", task_id, "tool call");
        let result = async {
            require_token(auth_token)?;
            let update =
                update_from_text(title, description, status, priority, due_date, category)?;
            let task = self.apply_update(auth_token, task_id, &update).await?;
            Ok(format_updated(&task))
        }
        .await;
        render(Op::Update, result)
    }

    pub async fn mark_task_completed(&self, task_id: i64, auth_token: &str) -> String {
        debug!(tool = "mark_task_completed", task_id, "tool call");
        let result = self
            .apply_update(auth_token, task_id, &TaskUpdate::status(TaskStatus::Completed))
            .await
            .map(|task| format_completed(&task));
        render(Op::MarkCompleted, result)
    }

    pub async fn delete_task(&self, task_id: i64, auth_token: &str) -> String {
        debug!(tool = "delete_task", task_id, "tool call");
        let result = self
            .remove(auth_token, task_id)
            .await
            .map(|()| format_deleted(task_id));
        render(Op::Delete, result)
    }

    pub async fn search_tasks(&self, category: &str, auth_token: &str) -> String {
        debug!(tool = "search_tasks", "tool call");
        let result = self
            .search(auth_token, category)
            .await
            .map(|tasks| format_search_results(category.trim(), &tasks));
        render(Op::Search, result)
    }

    /// Runs a tool by name with JSON arguments, as a tool-calling runtime
    /// would. Unknown tools and bad arguments come back as text too.
    pub async fn invoke(&self, name: &str, arguments: &Value, auth_token: &str) -> String {
        let text = |key: &str| {
            arguments
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let task_id = match name {
            "get_task" | "update_task" | "mark_task_completed" | "delete_task" => {
                if let Err(err) = require_token(auth_token) {
                    return failure(Op::Get, &err);
                }
                match id_argument(arguments) {
                    Ok(id) => id,
                    Err(message) => return message,
                }
            }
            _ => 0,
        };

        match name {
            "create_task" => {
                self.create_task(
                    &text("title"),
                    &text("description"),
                    &text("priority"),
                    &text("due_date"),
                    &text("category"),
                    auth_token,
                )
                .await
            }
            "list_tasks" => self.list_tasks(auth_token).await,
            "get_task" => self.get_task(task_id, auth_token).await,
            "update_task" => {
                self.update_task(
                    task_id,
                    &text("title"),
                    &text("description"),
                    &text("status"),
                    &text("priority"),
                    &text("due_date"),
                    &text("category"),
                    auth_token,
                )
                .await
            }
            "mark_task_completed" => self.mark_task_completed(task_id, auth_token).await,
            "delete_task" => self.delete_task(task_id, auth_token).await,
            "search_tasks" => self.search_tasks(&text("category"), auth_token).await,
            other => format!("Error: unknown tool '{other}'"),
        }
    }

    pub fn definitions() -> Vec<ToolDefinition> {
        let task_id = json!({ "type": "integer", "description": "ID of the task" });
        vec![
            ToolDefinition {
                name: "create_task",
                description: "Create a new task in the TODO application.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "title": { "type": "string", "description": "Task title (required)" },
                        "description": { "type": "string", "description": "Optional task description" },
                        "priority": { "type": "string", "enum": ["low", "medium", "high"], "description": "Task priority, defaults to medium" },
                        "due_date": { "type": "string", "description": "Optional due date in ISO format (YYYY-MM-DD)" },
                        "category": { "type": "string", "description": "Optional category for the task" }
                    },
                    "required": ["title"]
                }),
            },
            ToolDefinition {
                name: "list_tasks",
                description: "List all tasks for the authenticated user.",
                parameters: json!({ "type": "object", "properties": {}, "required": [] }),
            },
            ToolDefinition {
                name: "get_task",
                description: "Get details of a specific task by ID.",
                parameters: json!({
                    "type": "object",
                    "properties": { "task_id": task_id },
                    "required": ["task_id"]
                }),
            },
            ToolDefinition {
                name: "update_task",
                description: "Update an existing task. Only the given fields change.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "task_id": task_id,
                        "title": { "type": "string", "description": "New title" },
                        "description": { "type": "string", "description": "New description" },
                        "status": { "type": "string", "enum": ["pending", "completed"], "description": "New status" },
                        "priority": { "type": "string", "enum": ["low", "medium", "high"], "description": "New priority" },
                        "due_date": { "type": "string", "description": "New due date (YYYY-MM-DD)" },
                        "category": { "type": "string", "description": "New category" }
                    },
                    "required": ["task_id"]
                }),
            },
            ToolDefinition {
                name: "mark_task_completed",
                description: "Mark a task as completed.",
                parameters: json!({
                    "type": "object",
                    "properties": { "task_id": task_id },
                    "required": ["task_id"]
                }),
            },
            ToolDefinition {
                name: "delete_task",
                description: "Delete a task permanently.",
                parameters: json!({
                    "type": "object",
                    "properties": { "task_id": task_id },
                    "required": ["task_id"]
                }),
            },
            ToolDefinition {
                name: "search_tasks",
                description: "Search tasks by category.",
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "category": { "type": "string", "description": "Category to search for" }
                    },
                    "required": ["category"]
                }),
            },
        ]
    }
}

fn id_argument(arguments: &Value) -> Result<i64, String> {
    match arguments.get("task_id") {
        Some(Value::Number(number)) => number
            .as_i64()
            .ok_or_else(|| "Error: task_id must be an integer".to_string()),
        Some(Value::String(raw)) => raw
            .trim()
            .trim_start_matches('#')
            .parse()
            .map_err(|_| format!("Error: task_id '{raw}' is not a number")),
        _ => Err("Error: task_id is required".to_string()),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{Call, RecordingStore, task};
    use super::{AUTH_REQUIRED, NO_TASKS, ToolAdapter, format_task_list, normalize_due_date};
    use crate::error::AppError;
    use crate::model::{TaskPriority, TaskStatus, TaskUpdate};
    use crate::storage::TaskStore;
    use std::sync::Arc;

    fn adapter(store: &Arc<RecordingStore>) -> ToolAdapter {
        let store: Arc<dyn TaskStore> = Arc::clone(store) as Arc<dyn TaskStore>;
        ToolAdapter::new(store)
    }

    #[tokio::test]
    async fn every_tool_requires_a_token_before_calling_the_store() {
        let store = Arc::new(RecordingStore::default());
        let tools = adapter(&store);

        let replies = vec![
            tools.create_task("Buy milk", "", "", "", "", "").await,
            tools.list_tasks("").await,
            tools.get_task(1, "").await,
            tools.update_task(1, "x", "", "", "", "", "", " ").await,
            tools.mark_task_completed(1, "").await,
            tools.delete_task(1, "").await,
            tools.search_tasks("work", "").await,
        ];

        for reply in replies {
            assert_eq!(reply, AUTH_REQUIRED);
        }
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn create_validates_locally() {
        let store = Arc::new(RecordingStore::default());
        let tools = adapter(&store);

        let blank = tools.create_task("  ", "", "", "", "", "tok").await;
        let bad_priority = tools.create_task("x", "", "urgent", "", "", "tok").await;
        let bad_date = tools.create_task("x", "", "", "next week", "", "tok").await;

        assert_eq!(blank, "❌ Cannot create task: title is required");
        assert!(bad_priority.starts_with("❌ Cannot create task: invalid priority"));
        assert!(bad_date.starts_with("❌ Cannot create task: due date"));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn create_success_embeds_returned_fields() {
        let store = Arc::new(RecordingStore::default());
        let tools = adapter(&store);

        let reply = tools
            .create_task("Buy milk", "2 litres", "HIGH", "2026-01-05", "errands", "tok")
            .await;

        assert_eq!(
            reply,
            "✅ Task created successfully!\n📝 Title: Buy milk\n🏷️ Priority: high\n📌 Status: pending\n🆔 Task ID: 1"
        );
        match &store.calls()[0] {
            Call::Create(new_task) => {
                assert_eq!(new_task.due_date.as_deref(), Some("2026-01-05T00:00:00"));
                assert_eq!(new_task.category.as_deref(), Some("errands"));
                assert_eq!(new_task.priority, TaskPriority::High);
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[tokio::test]
    async fn remote_and_transport_failures_become_text() {
        let remote = Arc::new(RecordingStore::failing(AppError::remote(
            500,
            "database is down",
        )));
        let transport = Arc::new(RecordingStore::failing(AppError::transport(
            "connection refused",
        )));

        assert_eq!(
            adapter(&remote).list_tasks("tok").await,
            "❌ Failed to list tasks: database is down"
        );
        assert_eq!(
            adapter(&transport).delete_task(3, "tok").await,
            "Error deleting task: connection refused"
        );
    }

    #[tokio::test]
    async fn update_sends_only_given_fields_and_rejects_empty_updates() {
        let store = Arc::new(RecordingStore::with_tasks(vec![task(
            5,
            "report",
            TaskStatus::Pending,
        )]));
        let tools = adapter(&store);

        let empty = tools.update_task(5, "", "", "", "", "", "", "tok").await;
        let reply = tools
            .update_task(5, "", "", "completed", "low", "", "", "tok")
            .await;

        assert_eq!(empty, "❌ Cannot update task: no fields to update");
        assert_eq!(
            reply,
            "✅ Task updated successfully!\n📝 Title: report\n📌 Status: completed\n🏷️ Priority: low"
        );
        assert_eq!(
            store.calls(),
            vec![Call::Update(
                5,
                TaskUpdate {
                    status: Some(TaskStatus::Completed),
                    priority: Some(TaskPriority::Low),
                    ..TaskUpdate::default()
                }
            )]
        );
    }

    #[tokio::test]
    async fn missing_task_surfaces_store_detail() {
        let store = Arc::new(RecordingStore::default());
        let reply = adapter(&store).get_task(42, "tok").await;

        assert_eq!(reply, r#"❌ Failed to get task: {"detail":"Task not found"}"#);
    }

    #[tokio::test]
    async fn search_filters_by_category_case_insensitively() {
        let mut work = task(1, "deck", TaskStatus::Pending);
        work.category = Some("Work".into());
        let mut home = task(2, "laundry", TaskStatus::Pending);
        home.category = Some("home".into());
        let store = Arc::new(RecordingStore::with_tasks(vec![work, home]));
        let tools = adapter(&store);

        let found = tools.search_tasks("work", "tok").await;
        let none = tools.search_tasks("garden", "tok").await;

        assert!(found.contains("deck"));
        assert!(!found.contains("laundry"));
        assert_eq!(none, "📋 No tasks found in category 'garden'.");
    }

    #[test]
    fn task_list_orders_counts_then_pending_then_completed() {
        let tasks = vec![
            task(1, "alpha", TaskStatus::Completed),
            task(2, "beta", TaskStatus::Pending),
            task(3, "gamma", TaskStatus::Pending),
        ];

        let rendered = format_task_list(&tasks);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "📊 Task Summary: 2 pending, 1 completed");
        assert_eq!(lines[2], "⏳ Pending Tasks:");
        assert_eq!(lines[3], "  1. 🟡 beta - medium [#2]");
        assert_eq!(lines[4], "  2. 🟡 gamma - medium [#3]");
        assert_eq!(lines[6], "✅ Completed Tasks:");
        assert_eq!(lines[7], "  1. ✓ alpha [#1]");
        assert_eq!(format_task_list(&[]), NO_TASKS);
    }

    #[test]
    fn due_dates_are_normalized() {
        assert_eq!(normalize_due_date("").unwrap(), None);
        assert_eq!(
            normalize_due_date("2026-02-01").unwrap().as_deref(),
            Some("2026-02-01T00:00:00")
        );
        assert_eq!(
            normalize_due_date("2026-02-01T09:30:00").unwrap().as_deref(),
            Some("2026-02-01T09:30:00")
        );
        assert!(normalize_due_date("2026-02-30").is_err());
    }

    #[tokio::test]
    async fn invoke_dispatches_by_name() {
        let store = Arc::new(RecordingStore::with_tasks(vec![task(
            9,
            "taxes",
            TaskStatus::Pending,
        )]));
        let tools = adapter(&store);

        let done = tools
            .invoke("mark_task_completed", &serde_json::json!({ "task_id": "#9" }), "tok")
            .await;
        let missing = tools
            .invoke("delete_task", &serde_json::json!({}), "tok")
            .await;
        let unknown = tools.invoke("fly", &serde_json::json!({}), "tok").await;

        assert_eq!(
            done,
            "✅ Task #9 \"taxes\" marked as completed successfully! Great job!"
        );
        assert_eq!(missing, "Error: task_id is required");
        assert_eq!(unknown, "Error: unknown tool 'fly'");
    }

    #[tokio::test]
    async fn invoke_checks_token_before_arguments() {
        let store = Arc::new(RecordingStore::default());
        let tools = adapter(&store);

        for name in ["get_task", "update_task", "mark_task_completed", "delete_task"] {
            let missing_id = tools.invoke(name, &serde_json::json!({}), "").await;
            let bad_id = tools
                .invoke(name, &serde_json::json!({ "task_id": "soon" }), "  ")
                .await;
            assert_eq!(missing_id, AUTH_REQUIRED, "{name}");
            assert_eq!(bad_id, AUTH_REQUIRED, "{name}");
        }
        assert!(store.calls().is_empty());
    }

    #[test]
    fn definitions_cover_every_tool() {
        let names: Vec<&str> = ToolAdapter::definitions()
            .iter()
            .map(|definition| definition.name)
            .collect();

        assert_eq!(
            names,
            vec![
                "create_task",
                "list_tasks",
                "get_task",
                "update_task",
                "mark_task_completed",
                "delete_task",
                "search_tasks"
            ]
        );
        for definition in ToolAdapter::definitions() {
            assert_eq!(definition.parameters["type"], "object");
            assert!(definition.parameters["properties"].get("auth_token").is_none());
        }
    }
}
