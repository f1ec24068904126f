#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid interval expression: {0}")]
    InvalidInterval(String),

    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    #[error("invalid business hours expression: {0}")]
    InvalidBusinessHours(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
