//! Error types for the to-do domain

use thiserror::Error;

use crate::types::TaskId;

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the task store and domain types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Task text is empty or whitespace-only")]
    BlankText,

    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Invalid state transition for task {id}: {from} -> {to}")]
    InvalidStateTransition {
        id: TaskId,
        from: String,
        to: String,
    },

    #[error("Unknown tab fragment: {0}")]
    UnknownTab(String),

    #[error("Session limit reached ({0} sessions)")]
    SessionLimit(usize),
}
