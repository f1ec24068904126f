use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("task store error: {0}")]
    Task(#[from] taskforge_tasks::TaskError),
    #[error("memory store error: {0}")]
    Memory(#[from] taskforge_memory::MemoryError),
    #[error("scheduler error: {0}")]
    Schedule(#[from] taskforge_scheduler::SchedulerError),
    #[error("task {id} not found")]
    TaskNotFound { id: uuid::Uuid },
}

pub type Result<T> = std::result::Result<T, RunnerError>;
