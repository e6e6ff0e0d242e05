//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{RecordingAdapter, TestQueue};
//!
//! #[tokio::test]
//! async fn test_dispatch() {
//!     let queue = TestQueue::new();
//!     queue.enqueue_due("alice@example.com", 1);
//!     let adapter = RecordingAdapter::new();
//!     // build a NotificationDispatchJob from queue.store() and adapter.clone()
//! }
//! ```

mod adapters;
mod fixtures;
mod logs;
mod stores;

#[allow(unused_imports)]
pub use adapters::RecordingAdapter;
#[allow(unused_imports)]
pub use fixtures::{job_context, wait_until, TestQueue};
#[allow(unused_imports)]
pub use logs::{CapturedEvent, LogCapture};
#[allow(unused_imports)]
pub use stores::UnavailableQueue;
