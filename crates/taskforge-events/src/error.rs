use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid glob pattern: {0}")]
    InvalidGlob(String),
}

pub type Result<T> = std::result::Result<T, EventError>;
