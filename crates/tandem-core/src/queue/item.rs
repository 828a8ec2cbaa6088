//! Queue item: one submitted task plus the link to the task submitted after it.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// How a job finished. Only used for bookkeeping; the caller's value or
/// error travels through the submission's own channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settled {
    Succeeded,
    Failed,
    Panicked,
}

/// Sends the caller's value or error to its `Submission`. Run outside the
/// queue lock, since dropping an unreceived value runs caller code.
pub(crate) type Deliver = Box<dyn FnOnce() + Send + 'static>;

/// Type-erased unit of work. Runs the caller's closure and returns how it
/// settled plus the delivery of its outcome.
pub(crate) type Job = Pin<Box<dyn Future<Output = (Settled, Deliver)> + Send + 'static>>;

/// Item lifecycle.
///
/// State transitions:
/// - Pending -> Running -> Done
/// - Pending -> Done (discarded by `clear()`)
///
/// The job lives inside `Pending`, so taking it out is the only way to run it
/// and it can be taken at most once.
pub(crate) enum ItemState {
    Pending(Job),
    Running,
    Done,
}

pub(crate) struct ItemLink {
    pub(crate) state: ItemState,
    pub(crate) successor: Option<Arc<QueueItem>>,
}

/// One node of the chain.
///
/// `link` is only ever locked while the owning queue's chain lock is held,
/// so the two locks are always taken in the same order.
pub(crate) struct QueueItem {
    seq: u64,
    link: Mutex<ItemLink>,
}

impl QueueItem {
    pub(crate) fn new(seq: u64, job: Job) -> Self {
        Self {
            seq,
            link: Mutex::new(ItemLink {
                state: ItemState::Pending(job),
                successor: None,
            }),
        }
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn link(&self) -> MutexGuard<'_, ItemLink> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pending -> Running. Returns the job to drive, or `None` if the item
    /// already left `Pending`.
    pub(crate) fn begin(&self) -> Option<Job> {
        let mut link = self.link();
        match std::mem::replace(&mut link.state, ItemState::Running) {
            ItemState::Pending(job) => Some(job),
            other => {
                link.state = other;
                None
            }
        }
    }

    /// Running -> Done. Hands back the successor, unlinking it from this item.
    pub(crate) fn finish(&self) -> Option<Arc<QueueItem>> {
        let mut link = self.link();
        link.state = ItemState::Done;
        link.successor.take()
    }

    /// Pending -> Done without running. Returns the job so the caller can
    /// drop it outside any lock, plus the rest of the chain.
    pub(crate) fn discard(&self) -> (Option<Job>, Option<Arc<QueueItem>>) {
        let mut link = self.link();
        let job = match std::mem::replace(&mut link.state, ItemState::Done) {
            ItemState::Pending(job) => Some(job),
            other => {
                link.state = other;
                None
            }
        };
        (job, link.successor.take())
    }

    pub(crate) fn set_successor(&self, next: Arc<QueueItem>) {
        self.link().successor = Some(next);
    }
}

// A long pending chain would otherwise be dropped recursively.
impl Drop for QueueItem {
    fn drop(&mut self) {
        let mut next = self
            .link
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .successor
            .take();
        while let Some(item) = next {
            next = match Arc::try_unwrap(item) {
                Ok(mut item) => item
                    .link
                    .get_mut()
                    .unwrap_or_else(PoisonError::into_inner)
                    .successor
                    .take(),
                Err(_) => None,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_job() -> Job {
        Box::pin(async { (Settled::Succeeded, Box::new(|| ()) as Deliver) })
    }

    #[test]
    fn begin_takes_the_job_once() {
        let item = QueueItem::new(0, noop_job());
        assert!(matches!(item.link().state, ItemState::Pending(_)));

        assert!(item.begin().is_some());
        assert!(matches!(item.link().state, ItemState::Running));
        assert!(item.begin().is_none());
    }

    #[test]
    fn finish_hands_over_successor() {
        let first = QueueItem::new(0, noop_job());
        let second = Arc::new(QueueItem::new(1, noop_job()));
        first.set_successor(Arc::clone(&second));

        first.begin();
        let next = first.finish().expect("successor linked");
        assert_eq!(next.seq(), 1);
        assert!(matches!(first.link().state, ItemState::Done));
        assert!(first.link().successor.is_none());
    }

    #[test]
    fn discard_skips_running_items() {
        let item = QueueItem::new(0, noop_job());
        item.begin();
        let (job, _) = item.discard();
        assert!(job.is_none());
        assert!(matches!(item.link().state, ItemState::Running));
    }

    #[test]
    fn dropping_a_long_chain_does_not_overflow() {
        let head = QueueItem::new(0, noop_job());
        let mut tail = Arc::new(QueueItem::new(1, noop_job()));
        head.set_successor(Arc::clone(&tail));
        for seq in 2..200_000 {
            let next = Arc::new(QueueItem::new(seq, noop_job()));
            tail.set_successor(Arc::clone(&next));
            tail = next;
        }
        drop(tail);
        drop(head);
    }
}
