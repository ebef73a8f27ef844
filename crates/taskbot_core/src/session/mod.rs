//! Multi-turn task creation: title, then description, then priority.

mod locks;
mod store;

pub use locks::KeyedLocks;
pub use store::{InMemorySessionStore, SessionStore};

use crate::error::AppError;
use crate::model::{NewTask, TaskPriority};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::debug;

const CANCEL_KEYWORDS: &[&str] = &["cancel", "nevermind", "never mind", "stop"];
const NO_DESCRIPTION: &[&str] = &["none", "no description", "skip"];

pub const TITLE_PROMPT: &str =
    "Let's create a new task! 📝 What should the title be? (say \"cancel\" at any time to stop)";
pub const PRIORITY_PROMPT: &str = "What priority should it have? Choose one of: low, medium, high.";
pub const CANCELLED_REPLY: &str = "Okay, task creation cancelled. Nothing was saved.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    AwaitingTitle,
    AwaitingDescription,
    AwaitingPriority,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
}

impl Draft {
    pub fn to_new_task(&self) -> Result<NewTask, AppError> {
        let title = self
            .title
            .as_deref()
            .ok_or_else(|| AppError::invalid_input("title is required"))?;
        let mut task = NewTask::new(title);
        task.description = self.description.clone();
        task.priority = self.priority.unwrap_or_default();
        task.validate()?;
        Ok(task)
    }
}

/// What the caller should do after feeding one message into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStep {
    /// Keep the (updated) session and send `reply`.
    Continue { reply: String },
    /// All fields collected; create the task.
    Submit { task: NewTask },
    /// Drop the session and send `reply`.
    Cancelled { reply: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub user_id: String,
    pub stage: SessionStage,
    pub draft: Draft,
    pub touched_at_ms: i64,
}

pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

impl ConversationSession {
    pub fn start(user_id: &str, session_id: &str) -> (Self, String) {
        let session = Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            stage: SessionStage::AwaitingTitle,
            draft: Draft::default(),
            touched_at_ms: now_ms(),
        };
        (session, TITLE_PROMPT.to_string())
    }

    pub fn is_idle(&self, now_ms: i64, idle_timeout: Duration) -> bool {
        let limit_ms = i64::try_from(idle_timeout.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.touched_at_ms) > limit_ms
    }

    pub fn advance(&mut self, input: &str) -> SessionStep {
        let trimmed = input.trim();
        self.touched_at_ms = now_ms();

        if is_cancel(trimmed) {
            debug!(user_id = %self.user_id, stage = ?self.stage, "task creation cancelled");
            return SessionStep::Cancelled {
                reply: CANCELLED_REPLY.to_string(),
            };
        }

        match self.stage {
            SessionStage::AwaitingTitle => {
                if trimmed.is_empty() {
                    return SessionStep::Continue {
                        reply: format!("A task needs a title. {TITLE_PROMPT}"),
                    };
                }
                self.draft.title = Some(trimmed.to_string());
                self.stage = SessionStage::AwaitingDescription;
                SessionStep::Continue {
                    reply: format!(
                        "Got it: \"{trimmed}\". Add a description, or reply \"none\", \"no description\" or \"skip\" to leave it empty."
                    ),
                }
            }
            SessionStage::AwaitingDescription => {
                self.draft.description = if is_no_description(trimmed) {
                    None
                } else {
                    Some(trimmed.to_string())
                };
                self.stage = SessionStage::AwaitingPriority;
                SessionStep::Continue {
                    reply: PRIORITY_PROMPT.to_string(),
                }
            }
            SessionStage::AwaitingPriority => match TaskPriority::parse(trimmed) {
                Ok(priority) => {
                    self.draft.priority = Some(priority);
                    match self.draft.to_new_task() {
                        Ok(task) => SessionStep::Submit { task },
                        Err(err) => SessionStep::Continue {
                            reply: format!("❌ {}", err.message()),
                        },
                    }
                }
                Err(_) => SessionStep::Continue {
                    reply: format!("\"{trimmed}\" is not a valid priority. {PRIORITY_PROMPT}"),
                },
            },
        }
    }
}

fn is_cancel(input: &str) -> bool {
    let lower = input.to_lowercase();
    CANCEL_KEYWORDS.contains(&lower.as_str())
}

fn is_no_description(input: &str) -> bool {
    let lower = input.to_lowercase();
    lower.is_empty() || NO_DESCRIPTION.contains(&lower.as_str())
}
