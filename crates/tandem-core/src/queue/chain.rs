//! Chain bookkeeping guarded by the queue lock.
//!
//! Every method here runs inside the queue's critical section and never
//! awaits, runs caller code, or drops a caller's job.

use std::sync::Arc;

use super::item::{Job, QueueItem, Settled};
use crate::observability::QueueStats;

/// What the caller has to do once the lock is released.
pub(crate) enum Dispatch {
    /// Spawn a driver for this item.
    Start(Arc<QueueItem>, Job),
    /// Nothing to start now.
    Wait,
}

pub(crate) struct Chain {
    /// Most recently submitted item that has not finished; `None` when idle.
    tail: Option<Arc<QueueItem>>,

    /// Item whose job is executing. `tail.is_some()` implies this is `Some`.
    running: Option<Arc<QueueItem>>,

    next_seq: u64,

    stats: QueueStats,
}

impl Chain {
    pub(crate) fn new() -> Self {
        Self {
            tail: None,
            running: None,
            next_seq: 0,
            stats: QueueStats::default(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tail.is_none()
    }

    pub(crate) fn stats(&self) -> QueueStats {
        self.stats.clone()
    }

    /// Link a new job behind the tail, or start it if the chain is empty.
    pub(crate) fn push(&mut self, job: Job) -> (u64, Dispatch) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.stats.submitted += 1;

        let item = Arc::new(QueueItem::new(seq, job));
        match self.tail.replace(Arc::clone(&item)) {
            Some(previous) => {
                previous.set_successor(item);
                self.stats.pending += 1;
                (seq, Dispatch::Wait)
            }
            None => (seq, self.start(item)),
        }
    }

    /// Record that `item` finished and pick what runs next.
    pub(crate) fn complete(&mut self, item: &Arc<QueueItem>, settled: Settled) -> Dispatch {
        match settled {
            Settled::Succeeded => self.stats.succeeded += 1,
            Settled::Failed => self.stats.failed += 1,
            Settled::Panicked => self.stats.panicked += 1,
        }

        if self
            .running
            .as_ref()
            .is_some_and(|running| Arc::ptr_eq(running, item))
        {
            self.running = None;
            self.stats.running = 0;
        }

        match item.finish() {
            Some(next) => {
                self.stats.pending = self.stats.pending.saturating_sub(1);
                self.start(next)
            }
            None => {
                // No successor observed: the queue is empty again, unless the
                // tail already moved on.
                if self.tail.as_ref().is_some_and(|tail| Arc::ptr_eq(tail, item)) {
                    self.tail = None;
                }
                Dispatch::Wait
            }
        }
    }

    /// Detach every pending item. The running item stays the tail so that a
    /// later `push` still waits for it.
    ///
    /// Returns the discarded jobs; the caller drops them after unlocking.
    pub(crate) fn sever(&mut self) -> Vec<Job> {
        let Some(running) = self.running.clone() else {
            self.tail = None;
            return Vec::new();
        };

        let next = running.link().successor.take();
        let discarded = self.discard_from(next);
        self.tail = Some(running);
        discarded
    }

    /// The driver of `item` was dropped before it finished (its runtime shut
    /// down). Nothing more can be spawned there, so `item` and everything
    /// linked behind it are discarded and the chain is left empty.
    ///
    /// Returns the discarded jobs; the caller drops them after unlocking.
    pub(crate) fn abandon(&mut self, item: &Arc<QueueItem>) -> Vec<Job> {
        if self
            .running
            .as_ref()
            .is_some_and(|running| Arc::ptr_eq(running, item))
        {
            self.running = None;
            self.stats.running = 0;
        }
        self.stats.discarded += 1;

        let next = item.finish();
        let discarded = self.discard_from(next);
        if self.running.is_none() {
            self.tail = None;
        }
        discarded
    }

    fn discard_from(&mut self, mut next: Option<Arc<QueueItem>>) -> Vec<Job> {
        let mut discarded = Vec::new();
        while let Some(item) = next {
            let (job, successor) = item.discard();
            discarded.extend(job);
            next = successor;
        }
        self.stats.pending = self.stats.pending.saturating_sub(discarded.len());
        self.stats.discarded += discarded.len() as u64;
        discarded
    }

    fn start(&mut self, item: Arc<QueueItem>) -> Dispatch {
        debug_assert!(self.running.is_none(), "two items running at once");
        match item.begin() {
            Some(job) => {
                self.running = Some(Arc::clone(&item));
                self.stats.running = 1;
                Dispatch::Start(item, job)
            }
            None => Dispatch::Wait,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::item::{Deliver, ItemState};

    fn job() -> Job {
        Box::pin(async { (Settled::Succeeded, Box::new(|| ()) as Deliver) })
    }

    fn started(dispatch: Dispatch) -> Arc<QueueItem> {
        match dispatch {
            Dispatch::Start(item, _) => item,
            Dispatch::Wait => panic!("expected the item to start"),
        }
    }

    #[test]
    fn first_push_starts_later_pushes_wait() {
        let mut chain = Chain::new();
        let (seq0, first) = chain.push(job());
        let (seq1, second) = chain.push(job());

        assert_eq!((seq0, seq1), (0, 1));
        assert!(matches!(first, Dispatch::Start(..)));
        assert!(matches!(second, Dispatch::Wait));
        assert_eq!(chain.stats().pending, 1);
        assert_eq!(chain.stats().running, 1);
    }

    #[test]
    fn complete_starts_successor_then_empties() {
        let mut chain = Chain::new();
        let first = started(chain.push(job()).1);
        chain.push(job());

        let second = started(chain.complete(&first, Settled::Failed));
        assert_eq!(second.seq(), 1);
        assert!(matches!(first.link().state, ItemState::Done));
        assert!(!chain.is_empty());

        assert!(matches!(
            chain.complete(&second, Settled::Succeeded),
            Dispatch::Wait
        ));
        assert!(chain.is_empty());

        let stats = chain.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);
        assert!(stats.is_idle());
    }

    #[test]
    fn sever_keeps_running_item_as_tail() {
        let mut chain = Chain::new();
        let first = started(chain.push(job()).1);
        chain.push(job());
        chain.push(job());

        let discarded = chain.sever();
        assert_eq!(discarded.len(), 2);
        assert!(!chain.is_empty());
        assert_eq!(chain.stats().discarded, 2);
        assert_eq!(chain.stats().pending, 0);

        // New work still queues behind the running item.
        let (_, dispatch) = chain.push(job());
        assert!(matches!(dispatch, Dispatch::Wait));

        let next = started(chain.complete(&first, Settled::Succeeded));
        assert_eq!(next.seq(), 3);
    }

    #[test]
    fn abandon_discards_item_and_everything_behind_it() {
        let mut chain = Chain::new();
        let first = started(chain.push(job()).1);
        chain.push(job());
        chain.push(job());

        let discarded = chain.abandon(&first);
        assert_eq!(discarded.len(), 2);
        assert!(chain.is_empty());

        let stats = chain.stats();
        assert_eq!(stats.discarded, 3);
        assert!(stats.is_idle());

        // The next push starts on an empty chain again.
        assert!(matches!(chain.push(job()).1, Dispatch::Start(..)));
    }

    #[test]
    fn sever_on_empty_chain_is_a_noop() {
        let mut chain = Chain::new();
        assert!(chain.sever().is_empty());
        assert!(chain.is_empty());
    }
}
