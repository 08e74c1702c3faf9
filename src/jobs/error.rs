//! Scheduler-local error type, mapped onto the crate-wide taxonomy at
//! the boundary (spec §7 "the scheduler translates worker exceptions
//! to the appropriate kind").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("operation queue is at capacity")]
    QueueFull,

    #[error("operation {0} not found")]
    NotFound(uuid::Uuid),

    #[error("operation {0} timed out")]
    TimedOut(uuid::Uuid),

    #[error("operation {0} was cancelled")]
    Cancelled(uuid::Uuid),

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    #[error(transparent)]
    Core(#[from] crate::error::Error),
}

impl From<Error> for crate::error::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::QueueFull => crate::error::Error::ResourceExhausted("operation queue at capacity".into()),
            Error::NotFound(id) => crate::error::Error::not_found(format!("operation {id}")),
            Error::TimedOut(id) => crate::error::Error::Timeout(format!("operation {id}")),
            Error::Cancelled(_) => crate::error::Error::Cancelled,
            Error::WorkerPanicked(msg) => crate::error::Error::internal(msg),
            Error::Core(inner) => inner,
        }
    }
}
