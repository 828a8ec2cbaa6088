//! Handle returned by `SequentialQueue::submit`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::QueueError;

/// Awaitable result of one submitted task.
///
/// Resolves with exactly what the work produced once it has run. Dropping the
/// handle does not cancel the work; the queue still runs it in order and the
/// result is thrown away.
#[must_use = "the task runs regardless, but its result is only observable through this handle"]
#[derive(Debug)]
pub struct Submission<T, E> {
    seq: u64,
    rx: oneshot::Receiver<Result<T, QueueError<E>>>,
}

impl<T, E> Submission<T, E> {
    pub(crate) fn new(seq: u64, rx: oneshot::Receiver<Result<T, QueueError<E>>>) -> Self {
        Self { seq, rx }
    }

    /// Position of this task in the queue's submission order (0-based).
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl<T, E> Future for Submission<T, E> {
    type Output = Result<T, QueueError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // The sender only goes away without sending when the job was dropped
        // unrun: cleared, or its runtime shut down.
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(QueueError::Discarded)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_with_sent_value() {
        let (tx, rx) = oneshot::channel::<Result<u32, QueueError<String>>>();
        let submission = Submission::new(4, rx);
        assert_eq!(submission.seq(), 4);

        tx.send(Ok(50)).unwrap();
        assert_eq!(submission.await.unwrap(), 50);
    }

    #[tokio::test]
    async fn dropped_sender_means_discarded() {
        let (tx, rx) = oneshot::channel::<Result<u32, QueueError<String>>>();
        drop(tx);
        let err = Submission::new(0, rx).await.unwrap_err();
        assert!(err.is_discarded());
    }
}
