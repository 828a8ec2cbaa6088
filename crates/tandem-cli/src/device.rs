//! Simulated single-access device.
//!
//! The device refuses overlapping commands, so any lapse in serialization
//! shows up as a `DeviceError::Collision`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tandem_core::Operation;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device busy: overlapping command {0}")]
    Collision(String),

    #[error("device rejected command {0}")]
    Rejected(String),
}

#[derive(Debug)]
pub struct Device {
    busy: AtomicBool,
    handled: AtomicU64,
    delay: Duration,
}

impl Device {
    pub fn new(delay: Duration) -> Self {
        Self {
            busy: AtomicBool::new(false),
            handled: AtomicU64::new(0),
            delay,
        }
    }

    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::SeqCst)
    }

    async fn transact(&self, command: &Command) -> Result<Reply, DeviceError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::Collision(command.label()));
        }
        tokio::time::sleep(self.delay).await;
        let counter = self.handled.fetch_add(1, Ordering::SeqCst) + 1;
        self.busy.store(false, Ordering::SeqCst);

        if command.fail {
            return Err(DeviceError::Rejected(command.label()));
        }
        Ok(Reply {
            producer: command.producer,
            sequence: command.sequence,
            counter,
        })
    }
}

/// One command from one producer.
#[derive(Debug, Clone)]
pub struct Command {
    pub device: Arc<Device>,
    pub producer: usize,
    pub sequence: usize,
    pub fail: bool,
}

impl Command {
    pub fn label(&self) -> String {
        format!("p{}#{}", self.producer, self.sequence)
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub producer: usize,
    pub sequence: usize,
    /// Device-wide count of commands handled, this one included.
    pub counter: u64,
}

#[async_trait]
impl Operation for Command {
    type Output = Reply;
    type Error = DeviceError;

    async fn execute(self: Box<Self>) -> Result<Reply, DeviceError> {
        self.device.transact(&self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::SequentialQueue;

    fn command(device: &Arc<Device>, sequence: usize, fail: bool) -> Command {
        Command {
            device: Arc::clone(device),
            producer: 0,
            sequence,
            fail,
        }
    }

    #[tokio::test]
    async fn overlapping_commands_collide_without_the_queue() {
        let device = Arc::new(Device::new(Duration::from_millis(20)));
        let first = Box::new(command(&device, 0, false)).execute();
        let second = Box::new(command(&device, 1, false)).execute();

        let (first, second) = tokio::join!(first, second);
        assert!(first.is_ok());
        assert!(matches!(second, Err(DeviceError::Collision(_))));
    }

    #[tokio::test]
    async fn queued_commands_never_collide() {
        let device = Arc::new(Device::new(Duration::from_millis(2)));
        let queue = SequentialQueue::new();

        let submissions: Vec<_> = (0..5)
            .map(|i| queue.submit_operation(command(&device, i, i == 2)))
            .collect();

        for (i, submission) in submissions.into_iter().enumerate() {
            match submission.await {
                Ok(reply) => assert_eq!(reply.counter, i as u64 + 1),
                Err(err) => {
                    assert_eq!(i, 2);
                    assert!(matches!(err.task_error(), Some(DeviceError::Rejected(_))));
                }
            }
        }
        assert_eq!(device.handled(), 5);
    }
}
