use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("task not found: {id}")]
    NotFound { id: uuid::Uuid },

    #[error("proposal not found: {id}")]
    ProposalNotFound { id: uuid::Uuid },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TaskError>;
