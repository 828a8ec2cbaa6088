//! tandem-core
//!
//! Sequential execution queue for async work that must reach one shared
//! resource (a device, a serial line, a single-flight API) one task at a time.
//!
//! # モジュール構成
//! - **queue**: `SequentialQueue`, `Submission`, `QueueBuilder`
//! - **operation**: 型付きの作業単位（`Operation` trait）
//! - **error**: `QueueError`
//! - **ids**: `QueueId`
//! - **observability**: `QueueStats`
//!
//! # 保証
//! - 同時に実行されるタスクは常に 1 つだけ
//! - submit された順に開始する
//! - あるタスクの失敗（エラー・panic）は、そのタスクの呼び出し元にだけ届き、後続は必ず開始する
//!
//! ```ignore
//! let queue = SequentialQueue::new();
//! let a = queue.submit(|| async { device.read().await });
//! let b = queue.submit(|| async { device.write(b"ping").await });
//! let (a, b) = (a.await, b.await);
//! ```

pub mod error;
pub mod ids;
pub mod observability;
pub mod operation;
pub mod queue;

pub use error::QueueError;
pub use ids::QueueId;
pub use observability::QueueStats;
pub use operation::Operation;
pub use queue::{QueueBuilder, SequentialQueue, Submission};
