pub mod classifier;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod llm;
pub mod model;
pub mod server;
pub mod session;
pub mod storage;
pub mod tools;

#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::model::{Task, TaskPriority, TaskStatus};

    #[test]
    fn task_has_required_fields() {
        let task: Task = serde_json::from_str(
            r#"{"id":1,"title":"demo","status":"pending","created_at":"2025-12-20T00:00:00"}"#,
        )
        .expect("minimal task parses");

        assert_eq!(task.id, 1);
        assert_eq!(task.title, "demo");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.description, None);
        assert!(!task.is_recurring);
    }

    #[test]
    fn app_error_exposes_code() {
        let err = AppError::invalid_input("missing title");
        assert_eq!(err.code(), "invalid_input");
    }
}
