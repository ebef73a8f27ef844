use crate::error::AppError;
use crate::session::ConversationSession;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Backing storage for open conversation sessions, keyed by user id.
///
/// Implementations only store; per-user serialization of turns is done by
/// the dialogue engine.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<ConversationSession>, AppError>;

    async fn save(&self, session: ConversationSession) -> Result<(), AppError>;

    async fn remove(&self, user_id: &str) -> Result<Option<ConversationSession>, AppError>;

    /// Removes sessions untouched for longer than `idle_timeout` and returns
    /// how many were dropped.
    async fn evict_idle(&self, now_ms: i64, idle_timeout: Duration) -> Result<usize, AppError>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, ConversationSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, user_id: &str) -> Result<Option<ConversationSession>, AppError> {
        Ok(self.sessions.read().await.get(user_id).cloned())
    }

    async fn save(&self, session: ConversationSession) -> Result<(), AppError> {
        self.sessions
            .write()
            .await
            .insert(session.user_id.clone(), session);
        Ok(())
    }

    async fn remove(&self, user_id: &str) -> Result<Option<ConversationSession>, AppError> {
        Ok(self.sessions.write().await.remove(user_id))
    }

    async fn evict_idle(&self, now_ms: i64, idle_timeout: Duration) -> Result<usize, AppError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_idle(now_ms, idle_timeout));
        Ok(before - sessions.len())
    }
}
