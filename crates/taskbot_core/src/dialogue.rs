//! Turn handling: open creation sessions first, otherwise classify and
//! dispatch to the task tools.

use crate::classifier::{classify, extract_priority_change, extract_status_change, extract_task_id};
use crate::config::{Config, CreateTaskMode};
use crate::error::AppError;
use crate::llm::TextGenerator;
use crate::model::{Intent, TaskStatus, TaskUpdate};
use crate::session::{ConversationSession, KeyedLocks, SessionStep, SessionStore, now_ms};
use crate::tools::{
    AUTH_REQUIRED, Op, ToolAdapter, failure, format_created, format_deleted, format_task_list,
    format_updated,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const GUIDED_CREATE_REPLY: &str = "Please click the 'Create task' button to add a new task. It opens a simple form where you can enter all the details!";
pub const UPDATE_NEEDS_ID: &str =
    "Which task should I update? Please include its number, for example \"mark task #3 as done\".";
pub const DELETE_NEEDS_ID: &str =
    "Which task should I delete? Please include its number, for example \"delete task #3\".";
pub const FALLBACK_REPLY: &str = "I can help you manage your tasks. Try one of these:\n\
• \"Create a task\"\n\
• \"Show my tasks\"\n\
• \"Mark task #3 as done\"\n\
• \"Delete task #3\"";
const RETRY_HINT: &str = "Reply with the priority again to retry, or \"cancel\" to stop.";

pub const SYSTEM_PROMPT: &str = "You are the assistant of a TODO application. Users can create tasks, \
list their tasks, update a task (mark it done or change its priority) and delete a task. \
Answer briefly and in a friendly tone. When a request is outside task management, say what you \
can help with instead. Never claim to have changed a task yourself.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuredAction {
    OpenCreateForm,
    TaskCreated { task_id: i64 },
    TasksListed { pending: usize, completed: usize },
    TaskUpdated { task_id: i64 },
    TaskDeleted { task_id: i64 },
    CreationCancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueReply {
    pub text: String,
    pub intent: Intent,
    pub action: Option<StructuredAction>,
    pub session_id: String,
}

pub struct DialogueEngine {
    tools: ToolAdapter,
    sessions: Arc<dyn SessionStore>,
    locks: KeyedLocks,
    generator: Option<Arc<dyn TextGenerator>>,
    create_mode: CreateTaskMode,
    idle_timeout: Duration,
}

impl DialogueEngine {
    pub fn new(tools: ToolAdapter, sessions: Arc<dyn SessionStore>) -> Self {
        let defaults = Config::default();
        Self {
            tools,
            sessions,
            locks: KeyedLocks::new(),
            generator: None,
            create_mode: defaults.create_task_mode,
            idle_timeout: defaults.session_idle_timeout(),
        }
    }

    pub fn from_config(
        config: &Config,
        tools: ToolAdapter,
        sessions: Arc<dyn SessionStore>,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        let mut engine = Self::new(tools, sessions)
            .with_create_mode(config.create_task_mode)
            .with_idle_timeout(config.session_idle_timeout());
        engine.generator = generator;
        engine
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_create_mode(mut self, mode: CreateTaskMode) -> Self {
        self.create_mode = mode;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn tools(&self) -> &ToolAdapter {
        &self.tools
    }

    pub fn create_mode(&self) -> CreateTaskMode {
        self.create_mode
    }

    pub async fn handle(&self, user_id: &str, message: &str, auth_token: &str) -> DialogueReply {
        self.handle_in_session(user_id, None, message, auth_token)
            .await
    }

    /// Like [`DialogueEngine::handle`], reusing `session_id` for the reply
    /// when the user has no open session.
    pub async fn handle_in_session(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        message: &str,
        auth_token: &str,
    ) -> DialogueReply {
        let _turn = self.locks.lock(user_id).await;
        let fallback_id = session_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        match self.open_session(user_id).await {
            Ok(Some(session)) => return self.continue_session(session, message, auth_token).await,
            Ok(None) => {}
            Err(err) => {
                warn!(user_id, code = err.code(), "session lookup failed");
                return reply(
                    format!("Sorry, I could not load your conversation: {}", err.message()),
                    Intent::Unknown,
                    None,
                    fallback_id,
                );
            }
        }

        let intent = classify(message);
        info!(user_id, intent = %intent, "handling message");

        let (text, action) = match intent {
            Intent::CreateTask => {
                return self
                    .begin_creation(user_id, fallback_id, auth_token)
                    .await;
            }
            Intent::ListTasks => self.list(auth_token).await,
            Intent::UpdateTask => self.update(message, auth_token).await,
            Intent::DeleteTask => self.delete(message, auth_token).await,
            Intent::Unknown => (self.free_text(message).await, None),
        };
        reply(text, intent, action, fallback_id)
    }

    /// Drops sessions idle past the configured timeout.
    pub async fn evict_idle(&self) -> Result<usize, AppError> {
        let evicted = self
            .sessions
            .evict_idle(now_ms(), self.idle_timeout)
            .await?;
        self.locks.prune();
        if evicted > 0 {
            info!(evicted, "expired idle sessions");
        }
        Ok(evicted)
    }

    async fn open_session(&self, user_id: &str) -> Result<Option<ConversationSession>, AppError> {
        match self.sessions.load(user_id).await? {
            Some(session) if session.is_idle(now_ms(), self.idle_timeout) => {
                debug!(user_id, "session expired");
                self.sessions.remove(user_id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn begin_creation(
        &self,
        user_id: &str,
        session_id: String,
        auth_token: &str,
    ) -> DialogueReply {
        if self.create_mode == CreateTaskMode::Guided {
            return reply(
                GUIDED_CREATE_REPLY.to_string(),
                Intent::CreateTask,
                Some(StructuredAction::OpenCreateForm),
                session_id,
            );
        }
        if auth_token.trim().is_empty() {
            return reply(AUTH_REQUIRED.to_string(), Intent::CreateTask, None, session_id);
        }

        let (session, prompt) = ConversationSession::start(user_id, &session_id);
        if let Err(err) = self.sessions.save(session).await {
            warn!(user_id, code = err.code(), "could not open session");
            return reply(
                format!("Sorry, I could not start a new task: {}", err.message()),
                Intent::CreateTask,
                None,
                session_id,
            );
        }
        debug!(user_id, "creation session opened");
        reply(prompt, Intent::CreateTask, None, session_id)
    }

    async fn continue_session(
        &self,
        mut session: ConversationSession,
        message: &str,
        auth_token: &str,
    ) -> DialogueReply {
        let user_id = session.user_id.clone();
        let session_id = session.session_id.clone();

        let (text, action, keep) = match session.advance(message) {
            SessionStep::Continue { reply } => (reply, None, true),
            SessionStep::Cancelled { reply } => {
                (reply, Some(StructuredAction::CreationCancelled), false)
            }
            SessionStep::Submit { task } => match self.tools.submit(auth_token, &task).await {
                Ok(created) => {
                    info!(user_id = %user_id, task_id = created.id, "task created from conversation");
                    (
                        format_created(&created),
                        Some(StructuredAction::TaskCreated {
                            task_id: created.id,
                        }),
                        false,
                    )
                }
                Err(err) if err.preserves_session() => (
                    format!("{}\n{RETRY_HINT}", failure(Op::Create, &err)),
                    None,
                    true,
                ),
                Err(err) => (failure(Op::Create, &err), None, false),
            },
        };

        let stored = if keep {
            self.sessions.save(session).await
        } else {
            self.sessions.remove(&user_id).await.map(|_| ())
        };
        if let Err(err) = stored {
            warn!(user_id = %user_id, code = err.code(), "session update failed");
        }

        reply(text, Intent::CreateTask, action, session_id)
    }

    async fn list(&self, auth_token: &str) -> (String, Option<StructuredAction>) {
        match self.tools.fetch_all(auth_token).await {
            Ok(tasks) => {
                let completed = tasks
                    .iter()
                    .filter(|task| task.status == TaskStatus::Completed)
                    .count();
                let action = StructuredAction::TasksListed {
                    pending: tasks.len() - completed,
                    completed,
                };
                (format_task_list(&tasks), Some(action))
            }
            Err(err) => (failure(Op::List, &err), None),
        }
    }

    async fn update(&self, message: &str, auth_token: &str) -> (String, Option<StructuredAction>) {
        if auth_token.trim().is_empty() {
            return (AUTH_REQUIRED.to_string(), None);
        }
        let Some(task_id) = extract_task_id(message) else {
            return (unresolved(UPDATE_NEEDS_ID), None);
        };

        let update = TaskUpdate {
            status: extract_status_change(message),
            priority: extract_priority_change(message),
            ..TaskUpdate::default()
        };
        if update.is_empty() {
            return (
                format!(
                    "What should I change on task #{task_id}? You can mark it done or not done, or set its priority to low, medium or high."
                ),
                None,
            );
        }

        match self.tools.apply_update(auth_token, task_id, &update).await {
            Ok(task) => (
                format_updated(&task),
                Some(StructuredAction::TaskUpdated { task_id: task.id }),
            ),
            Err(err) => (failure(Op::Update, &err), None),
        }
    }

    async fn delete(&self, message: &str, auth_token: &str) -> (String, Option<StructuredAction>) {
        if auth_token.trim().is_empty() {
            return (AUTH_REQUIRED.to_string(), None);
        }
        let Some(task_id) = extract_task_id(message) else {
            return (unresolved(DELETE_NEEDS_ID), None);
        };

        match self.tools.remove(auth_token, task_id).await {
            Ok(()) => (
                format_deleted(task_id),
                Some(StructuredAction::TaskDeleted { task_id }),
            ),
            Err(err) => (failure(Op::Delete, &err), None),
        }
    }

    async fn free_text(&self, message: &str) -> String {
        let Some(generator) = self.generator.as_ref() else {
            return FALLBACK_REPLY.to_string();
        };
        match generator.generate(SYSTEM_PROMPT, message).await {
            Ok(text) => text,
            Err(err) => {
                warn!(code = err.code(), "free-text generation failed");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}

fn unresolved(clarification: &str) -> String {
    let err = AppError::unresolved_reference(clarification);
    debug!(code = err.code(), "no task id in message");
    err.message().to_string()
}

fn reply(
    text: String,
    intent: Intent,
    action: Option<StructuredAction>,
    session_id: String,
) -> DialogueReply {
    DialogueReply {
        text,
        intent,
        action,
        session_id,
    }
}
