//! QueueBuilder - キューの構築
//!
//! `SequentialQueue::new()` で足りない場合（ログ用の名前を付けたい、
//! runtime の外から submit したい）に使います。

use tokio::runtime::Handle;

use super::SequentialQueue;

/// Builds a `SequentialQueue` with optional settings.
///
/// # 使用例
/// ```ignore
/// let printer = SequentialQueue::builder()
///     .name("label-printer")
///     .runtime(runtime.handle().clone())
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct QueueBuilder {
    name: Option<String>,
    runtime: Option<Handle>,
}

impl QueueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label shown in log spans and by `SequentialQueue::name`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Spawn task drivers on this runtime instead of the ambient one, which
    /// lets `submit` be called from threads outside any Tokio runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> SequentialQueue {
        SequentialQueue::from_parts(self.name, self.runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_build_is_unnamed_and_empty() {
        let queue = QueueBuilder::new().build();
        assert!(queue.name().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn name_is_kept() {
        let queue = QueueBuilder::new().name("serial-port").build();
        assert_eq!(queue.name(), Some("serial-port"));
    }
}
