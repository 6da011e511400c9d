//! Runtime seam for the audio visualizer workspace.
//!
//! Every other crate reaches the executor through this crate instead of
//! naming tokio directly, so the engine's suspension points (load pipeline,
//! time notifier, frame callbacks) all go through one place.
//!
//! # Modules
//!
//! - `task`: task spawning and abort handles
//! - `time`: sleep, intervals and monotonic instants
//! - `sync`: channels, locks and cancellation tokens
//! - `runtime`: `block_on` for synchronous entry points
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(5)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
