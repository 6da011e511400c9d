//! Task spawning.
//!
//! The engine spawns exactly three kinds of tasks: its own actor loop, one
//! fetch/decode pipeline per load generation, and (on desktop) the frame
//! ticker. All of them are owned through the handles re-exported here.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     let abort = handle.abort_handle();
//!     assert_eq!(handle.await.unwrap(), 42);
//!     abort.abort(); // no-op once the task finished
//! }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, AbortHandle, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the current runtime.
///
/// # Panics
///
/// Panics when called outside of a runtime context.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
