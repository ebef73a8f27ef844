mod intent;
mod task;

pub use intent::Intent;
pub use task::{NewTask, Recurrence, Task, TaskPriority, TaskStatus, TaskUpdate};
