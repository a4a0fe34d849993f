use crate::client::error::StoreError;
use crate::models::{NewTaskRequest, TaskPriority, TaskStatus, UpdateTaskRequest};

/// Raw form state as the user typed it.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<String>,
    pub completed: bool,
}

/// Normalized, validated form output.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPayload {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
    pub status: TaskStatus,
}

impl TaskDraft {
    /// Validates the draft synchronously. The only hard requirement is a
    /// non-blank title; everything else is normalized permissively.
    pub fn validate(&self) -> Result<TaskPayload, StoreError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(StoreError::Validation {
                field: "title",
                message: "Title is required".to_string(),
            });
        }

        let description = self.description.trim();
        Ok(TaskPayload {
            title: title.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            priority: self.priority.unwrap_or_default(),
            due_date: self.due_date.clone().filter(|d| !d.trim().is_empty()),
            status: if self.completed {
                TaskStatus::Completed
            } else {
                TaskStatus::Pending
            },
        })
    }
}

impl TaskPayload {
    /// Payload for task creation. Status is dropped: the store always
    /// creates tasks as pending.
    pub fn into_new_request(self) -> NewTaskRequest {
        NewTaskRequest {
            title: self.title,
            description: self.description,
            priority: Some(self.priority),
            due_date: self.due_date,
        }
    }

    /// Payload for editing an existing task, every field set.
    pub fn into_patch(self) -> UpdateTaskRequest {
        UpdateTaskRequest {
            title: Some(self.title),
            description: Some(self.description.unwrap_or_default()),
            status: Some(self.status),
            priority: Some(self.priority),
            due_date: self.due_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_title_is_rejected() {
        for title in ["", "   ", "\t\n"] {
            let draft = TaskDraft {
                title: title.to_string(),
                ..Default::default()
            };
            let err = draft.validate().expect_err("expected rejection");
            assert!(matches!(err, StoreError::Validation { field: "title", .. }));
        }
    }

    #[test]
    fn title_and_description_are_trimmed() {
        let draft = TaskDraft {
            title: "  Buy milk  ".to_string(),
            description: "   ".to_string(),
            ..Default::default()
        };
        let payload = draft.validate().expect("valid draft");
        assert_eq!(payload.title, "Buy milk");
        assert_eq!(payload.description, None);
    }

    #[test]
    fn defaults_are_applied() {
        let draft = TaskDraft {
            title: "Buy milk".to_string(),
            ..Default::default()
        };
        let payload = draft.validate().expect("valid draft");
        assert_eq!(payload.priority, TaskPriority::Medium);
        assert_eq!(payload.status, TaskStatus::Pending);
        assert_eq!(payload.due_date, None);
    }

    #[test]
    fn completed_flag_maps_to_status() {
        let draft = TaskDraft {
            title: "Buy milk".to_string(),
            completed: true,
            ..Default::default()
        };
        assert_eq!(draft.validate().expect("valid").status, TaskStatus::Completed);
    }
}
