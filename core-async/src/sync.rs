//! Synchronization primitives.
//!
//! The visualizer engine is an actor: a single task owns all engine state and
//! everything else talks to it through the channels re-exported here.
//! `CancellationToken` is used to tear down background work (the load
//! pipeline, the desktop frame ticker) synchronously and idempotently.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{mpsc, CancellationToken};
//!
//! let (tx, _rx) = mpsc::unbounded_channel::<u32>();
//! tx.send(1).unwrap();
//!
//! let token = CancellationToken::new();
//! token.cancel();
//! token.cancel(); // cancelling twice is a no-op
//! assert!(token.is_cancelled());
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

pub use tokio_util::sync::{CancellationToken, DropGuard};
