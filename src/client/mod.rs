pub mod error;
pub mod form;
pub mod remote;
pub mod store;
pub mod view;

pub use error::StoreError;
pub use form::{TaskDraft, TaskPayload};
pub use remote::{HttpTasks, JsonFileTasks, RemoteTasks};
pub use store::{BulkRemoveReport, TaskStore};
pub use view::{TaskBoard, ViewComposer, partition, sorted_by_priority};
