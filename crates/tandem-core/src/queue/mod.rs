//! Sequential queue: one-at-a-time, first-submitted-first-started execution
//! of async work against a single shared resource.
//!
//! Design:
//! - Each submission becomes a `QueueItem` linked behind the current tail.
//! - The only synchronization point is the chain lock, held while linking
//!   (and possibly starting) a new item and while a finished item hands over
//!   to its successor. Nothing awaits under it.
//! - There is no scheduler loop: a finished item spawns the driver of the
//!   next one.

mod builder;
mod chain;
mod item;
mod submission;

pub use builder::QueueBuilder;
pub use submission::Submission;

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tracing::Instrument;

use self::chain::{Chain, Dispatch};
use self::item::{Deliver, Job, QueueItem, Settled};
use crate::error::QueueError;
use crate::ids::QueueId;
use crate::observability::QueueStats;
use crate::operation::Operation;

/// Serializes async work submitted from any number of producers.
///
/// One queue per protected resource. Cloning is cheap and every clone
/// refers to the same queue.
///
/// A task must not await a submission to its own queue: that submission can
/// only start after the awaiting task finishes.
#[derive(Clone)]
pub struct SequentialQueue {
    shared: Arc<Shared>,
}

struct Shared {
    id: QueueId,
    name: Option<String>,
    runtime: Option<Handle>,
    chain: Mutex<Chain>,
    /// `true` while the chain is empty.
    idle: watch::Sender<bool>,
}

impl SequentialQueue {
    /// Create an empty queue that spawns on the ambient Tokio runtime.
    pub fn new() -> Self {
        Self::from_parts(None, None)
    }

    pub fn builder() -> QueueBuilder {
        QueueBuilder::new()
    }

    fn from_parts(name: Option<String>, runtime: Option<Handle>) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                id: QueueId::generate(),
                name,
                runtime,
                chain: Mutex::new(Chain::new()),
                idle,
            }),
        }
    }

    pub fn id(&self) -> QueueId {
        self.shared.id
    }

    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }

    /// Submit `work` and get a handle to its result.
    ///
    /// The task is linked into the queue before this returns. If the queue
    /// was empty it starts right away, otherwise it starts once every task
    /// submitted before it has finished, whether they succeeded or not.
    /// The handle does not need to be polled for the task to run.
    ///
    /// # Panics
    /// When the queue has no runtime of its own (see `QueueBuilder::runtime`)
    /// and this is called outside a Tokio runtime, like `tokio::spawn`. The
    /// panic happens before anything is linked, so the queue is unchanged.
    pub fn submit<F, Fut, T, E>(&self, work: F) -> Submission<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let runtime = self.shared.spawner();
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let (outcome, settled) = match AssertUnwindSafe(async move { work().await })
                .catch_unwind()
                .await
            {
                Ok(Ok(value)) => (Ok(value), Settled::Succeeded),
                Ok(Err(err)) => (Err(QueueError::Task(err)), Settled::Failed),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!(%message, "task panicked");
                    (Err(QueueError::Panicked(message)), Settled::Panicked)
                }
            };
            let deliver: Deliver = Box::new(move || {
                // The submitter may have dropped its handle.
                let _ = tx.send(outcome);
            });
            (settled, deliver)
        });

        let (seq, dispatch) = {
            let mut chain = self.shared.lock_chain();
            let pushed = chain.push(job);
            self.shared.publish_idle(&chain);
            pushed
        };

        match dispatch {
            Dispatch::Start(..) => {
                tracing::debug!(queue = %self.shared.id, seq, "submitted to empty queue")
            }
            Dispatch::Wait => tracing::debug!(queue = %self.shared.id, seq, "linked behind tail"),
        }
        self.shared.dispatch(dispatch, &runtime);

        Submission::new(seq, rx)
    }

    /// Submit a typed operation. Same guarantees as `submit`.
    pub fn submit_operation<O: Operation>(&self, operation: O) -> Submission<O::Output, O::Error> {
        self.submit(move || Box::new(operation).execute())
    }

    /// Whether nothing is running or pending. Snapshot only; never use it to
    /// decide whether access to the resource is safe.
    pub fn is_empty(&self) -> bool {
        self.shared.lock_chain().is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock_chain().stats().running > 0
    }

    /// Number of tasks linked but not started yet.
    pub fn pending(&self) -> usize {
        self.shared.lock_chain().stats().pending
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.lock_chain().stats()
    }

    /// Discard every task that has not started yet.
    ///
    /// A task that is already running is left alone and keeps its place:
    /// work submitted after `clear()` still waits for it to finish. The
    /// handles of discarded tasks resolve to `QueueError::Discarded`.
    ///
    /// Returns the number of discarded tasks.
    pub fn clear(&self) -> usize {
        let discarded = {
            let mut chain = self.shared.lock_chain();
            let discarded = chain.sever();
            self.shared.publish_idle(&chain);
            discarded
        };

        let count = discarded.len();
        // Dropping the jobs drops their result senders.
        drop(discarded);

        if count > 0 {
            tracing::info!(queue = %self.shared.id, discarded = count, "cleared pending tasks");
        }
        count
    }

    /// Wait until the queue is observed empty.
    ///
    /// Returns immediately when it already is. A gap between two tasks that
    /// closes before this task is polled again can be missed.
    pub async fn idle(&self) {
        let mut rx = self.shared.idle.subscribe();
        // `self` keeps the sender alive, so this cannot fail.
        let _ = rx.wait_for(|idle| *idle).await;
    }
}

impl Default for SequentialQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SequentialQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialQueue")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Shared {
    fn lock_chain(&self) -> MutexGuard<'_, Chain> {
        // No caller code runs under this lock, so a poisoned guard still
        // holds a consistent chain.
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_idle(&self, chain: &Chain) {
        let empty = chain.is_empty();
        self.idle.send_if_modified(|idle| {
            if *idle == empty {
                false
            } else {
                *idle = empty;
                true
            }
        });
    }

    fn spawner(&self) -> Handle {
        self.runtime.clone().unwrap_or_else(Handle::current)
    }

    fn dispatch(self: &Arc<Self>, dispatch: Dispatch, runtime: &Handle) {
        let Dispatch::Start(item, job) = dispatch else {
            return;
        };

        let span = tracing::debug_span!(
            "queue_item",
            queue = %self.id,
            name = self.name.as_deref(),
            seq = item.seq()
        );
        let completion = Completion {
            shared: Arc::clone(self),
            item: Some(item),
            runtime: runtime.clone(),
        };
        let driver = async move {
            tracing::trace!("started");
            let (settled, deliver) = job.await;
            tracing::debug!(?settled, "finished");
            completion.complete(settled, deliver);
        }
        .instrument(span);

        // On a runtime that has shut down the driver is dropped right here,
        // and `Completion` cleans up.
        runtime.spawn(driver);
    }

    /// Completion: bookkeeping under the lock, then the result, then the
    /// successor. A handle therefore resolves only after its item has left
    /// the chain, and before the next item starts.
    fn finish(
        self: &Arc<Self>,
        item: &Arc<QueueItem>,
        settled: Settled,
        deliver: Deliver,
        runtime: &Handle,
    ) {
        let next = {
            let mut chain = self.lock_chain();
            let next = chain.complete(item, settled);
            self.publish_idle(&chain);
            next
        };
        // Delivering drops the result when nobody is listening, and that drop
        // runs caller code.
        if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(deliver)) {
            let message = panic_message(payload.as_ref());
            tracing::warn!(queue = %self.id, seq = item.seq(), %message, "dropping an unclaimed result panicked");
        }
        self.dispatch(next, runtime);
    }

    fn abandon(&self, item: &Arc<QueueItem>) {
        let discarded = {
            let mut chain = self.lock_chain();
            let discarded = chain.abandon(item);
            self.publish_idle(&chain);
            discarded
        };
        tracing::warn!(
            queue = %self.id,
            seq = item.seq(),
            discarded = discarded.len(),
            "driver dropped before its task finished, discarding the rest of the chain"
        );
        drop(discarded);
    }
}

/// Owned by a running item's driver. Completing it hands over to the
/// successor; dropping it uncompleted (the runtime shut down under the task)
/// abandons the chain so no later handle waits forever.
struct Completion {
    shared: Arc<Shared>,
    item: Option<Arc<QueueItem>>,
    runtime: Handle,
}

impl Completion {
    fn complete(mut self, settled: Settled, deliver: Deliver) {
        if let Some(item) = self.item.take() {
            self.shared.finish(&item, settled, deliver, &self.runtime);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.shared.abandon(&item);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
