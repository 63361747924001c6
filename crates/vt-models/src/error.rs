//! Model error types.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),
}
