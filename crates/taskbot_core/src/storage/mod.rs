//! Access to the authoritative task store.
//!
//! Every operation carries the caller's bearer token; the store decides
//! ownership and authorization.

mod http_store;
pub mod json_store;

pub use http_store::HttpTaskStore;
pub use json_store::JsonTaskStore;

use crate::error::AppError;
use crate::model::{NewTask, Task, TaskUpdate};
use async_trait::async_trait;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, token: &str, task: &NewTask) -> Result<Task, AppError>;

    async fn list(&self, token: &str) -> Result<Vec<Task>, AppError>;

    async fn get(&self, token: &str, id: i64) -> Result<Task, AppError>;

    async fn update(&self, token: &str, id: i64, update: &TaskUpdate) -> Result<Task, AppError>;

    async fn delete(&self, token: &str, id: i64) -> Result<(), AppError>;
}
