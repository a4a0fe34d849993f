pub mod task;
pub mod user;

pub use task::{NewTaskRequest, Task, TaskPriority, TaskStatus, UpdateTaskRequest};
pub use user::{LoginRequest, RegisterRequest, Session, User};
