use std::error::Error;
use thiserror::Error;

/// Error type returned by job closures. Anything implementing `Error` converts via `?`.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("min_workers must be at least 1")]
    ZeroMinWorkers,
    #[error("min_workers ({min}) exceeds max_workers ({max})")]
    InvalidBounds { min: usize, max: usize },
    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,
    #[error("scale_interval must be non-zero")]
    ZeroScaleInterval,
}

/// Failure of a single job. Never fatal to the pool.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job failed on worker {worker}: {source}")]
    Failed {
        worker: usize,
        #[source]
        source: BoxError,
    },
    #[error("job panicked on worker {worker}: {message}")]
    Panicked { worker: usize, message: String },
}

impl JobError {
    pub fn worker(&self) -> usize {
        match self {
            JobError::Failed { worker, .. } | JobError::Panicked { worker, .. } => *worker,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum SubmitError {
    #[error("pool is shutting down")]
    Closed,
}
