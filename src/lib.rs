//! Type-safe Rust library for the XVIZ autonomous-vehicle data protocol.
//!
//! XVIZ streams time-ordered vehicle state (poses, point clouds, polylines,
//! polygons, images, scalar variables) from a data source to a
//! visualization client over two parallel wire representations: plain JSON
//! and a compact binary container interleaving a JSON skeleton with raw
//! numeric buffers.
//!
//! # Features
//!
//! - **Binary container codec**: byte-exact packing of numeric and image
//!   payloads with pointer-addressed buffer tables
//! - **Version-aware parsing**: both protocol major versions, enveloped or
//!   bare, normalize into one canonical message shape per frame
//! - **Streaming sessions**: per-connection parse state with per-frame
//!   error isolation
//! - **Playback**: paced log replay with latest-wins fan-out
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xviz::{LogProvider, MemorySource, Xviz};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = MemorySource::new(); // or any XvizSource implementation
//!     let player = Xviz::play(LogProvider::new(source));
//!     let mut frames = player.subscribe(Some(30.0));
//!
//!     while let Some(message) = frames.next().await {
//!         if let Some(timestamp) = message.timestamp() {
//!             println!("frame at {timestamp}");
//!         }
//!     }
//! }
//! ```

// Core types and error handling
pub mod config;
pub mod container;
mod data;
mod error;
pub mod envelope;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Protocol pipeline
pub mod parse;
pub mod sender;
pub mod session;
pub mod validate;

// Playback architecture
pub mod player;
pub mod provider;
pub mod source;
pub mod stream;

// Core exports
pub use config::{PrimitiveHook, XvizConfig};
pub use data::{XvizData, XvizFormat};
pub use error::*;
pub use types::*;

// Codec exports
pub use container::{decode_binary, encode_binary};

// Protocol exports
pub use envelope::{EnvelopeType, XVIZ_NAMESPACE};
pub use parse::parse_message;
pub use sender::{MemorySink, WireFormat, WirePayload, XvizSender, XvizSink};
pub use session::{FrameResult, XvizSession};
pub use validate::{NoopValidator, SchemaValidator};

// Playback exports
pub use player::LogPlayer;
pub use provider::{LogProvider, PlaybackProvider};
pub use source::{MemorySource, TimeRange, XvizSource};

/// Unified entry point for XVIZ processing.
///
/// This factory provides a consistent API for the two common setups: a
/// parse session for an incoming connection, and a player for log
/// playback.
///
/// # Examples
///
/// ## Streaming session
/// ```rust
/// use xviz::Xviz;
///
/// let mut session = Xviz::session();
/// let result = session.process_text(r#"{"type": "xviz/metadata", "data": {"version": "2.0.0"}}"#);
/// assert!(result.message().is_some());
/// ```
///
/// ## Log playback
/// ```rust,no_run
/// use xviz::{LogProvider, MemorySource, Xviz};
///
/// # #[tokio::main]
/// # async fn main() {
/// let player = Xviz::play(LogProvider::new(MemorySource::new()));
/// # }
/// ```
pub struct Xviz;

impl Xviz {
    /// Create a parse session with the default configuration.
    pub fn session() -> XvizSession {
        XvizSession::new(XvizConfig::default())
    }

    /// Create a parse session with an explicit configuration.
    pub fn session_with(config: XvizConfig) -> XvizSession {
        XvizSession::new(config)
    }

    /// Spawn a playback player over any provider.
    ///
    /// The player owns a reader task that parses frames through its own
    /// session; dropping the player cancels the task.
    pub fn play<P: PlaybackProvider>(provider: P) -> LogPlayer {
        LogPlayer::spawn(provider, XvizConfig::default())
    }
}
