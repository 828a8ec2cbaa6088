use async_trait::async_trait;

/// A unit of work expressed as a type instead of a closure.
///
/// Useful when the commands sent to a resource already exist as values
/// (e.g. one struct per device command). Submit it with
/// `SequentialQueue::submit_operation`.
///
/// `execute` takes `self: Box<Self>` so the operation is consumed: it runs at
/// most once, like any other submitted work.
#[async_trait]
pub trait Operation: Send + 'static {
    type Output: Send + 'static;
    type Error: Send + 'static;

    async fn execute(self: Box<Self>) -> Result<Self::Output, Self::Error>;
}
