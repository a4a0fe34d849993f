use thiserror::Error;

/// Failures surfaced by the task store client. Every variant is meant to be
/// shown to the user as a notification; none of them crash the view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
