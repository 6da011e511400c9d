//! Time-related abstractions.
//!
//! Re-exports tokio's timer primitives together with the std duration types,
//! plus helpers for the periodic notifications the engine emits while
//! playing.
//!
//! `Instant` here is tokio's instant so that tests can freeze and advance time
//! with `tokio::time::pause()`.

pub use std::time::Duration;
pub use tokio::time::{
    interval, interval_at, sleep, sleep_until, timeout, Instant, Interval, MissedTickBehavior,
    Sleep, Timeout,
};

/// Creates an interval whose first tick fires one full `period` from now.
///
/// `tokio::time::interval` completes its first tick immediately, which would
/// produce a notification at the instant playback starts. Missed ticks are
/// delayed rather than bursted so a stalled executor never produces a flurry
/// of catch-up notifications.
///
/// # Panics
///
/// Panics if `period` is zero.
pub fn delayed_interval(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
