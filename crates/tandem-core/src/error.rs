use thiserror::Error;

/// Outcome of a submission that did not produce a value.
///
/// `E` is the caller's own error type. The queue never inspects it: a task
/// that returns `Err(e)` resolves its own handle with `QueueError::Task(e)`
/// and nothing else.
#[derive(Debug, Error)]
pub enum QueueError<E> {
    /// The work ran and returned an error.
    #[error("{0}")]
    Task(E),

    /// The work never ran (discarded by `clear()`, or its runtime shut down).
    #[error("task was discarded before it started")]
    Discarded,

    /// The work panicked. The payload message is kept when it is a string.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl<E> QueueError<E> {
    /// The task's own error, if that is what this is.
    pub fn task_error(&self) -> Option<&E> {
        match self {
            QueueError::Task(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_task_error(self) -> Option<E> {
        match self {
            QueueError::Task(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, QueueError::Discarded)
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, QueueError::Panicked(_))
    }
}
