//! # Desktop Bridge Implementations
//!
//! Default implementations of the engine's host capabilities for desktop
//! platforms (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `AudioFetcher` using `reqwest` for `http(s)://` and `tokio::fs` for
//!   paths and `file://` URLs
//! - `AudioDecoder` using `symphonia`
//! - `FrameScheduler` using tokio timers at a fixed frame rate
//!
//! There is no desktop `AudioGraph` or `DrawingSurface` here; output devices
//! are always injected by the host.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopFetcher, IntervalFrameScheduler, SymphoniaDecoder};
//! use bridge_traits::{AudioDecoder, AudioFetcher};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = DesktopFetcher::new()?;
//!     let bytes = fetcher.fetch("/music/intro.flac".into()).await?;
//!     let buffer = SymphoniaDecoder::new().decode(bytes, Some("flac".into())).await?;
//!     println!("{:?}", buffer.duration());
//!     Ok(())
//! }
//! ```

mod decoder;
mod fetch;
mod frame;

pub use decoder::SymphoniaDecoder;
pub use fetch::{DesktopFetcher, RetryPolicy};
pub use frame::{IntervalFrameScheduler, DEFAULT_FRAME_PERIOD};
