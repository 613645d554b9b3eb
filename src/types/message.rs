//! Top-level canonical message variants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::stream::StreamEntry;

/// One canonical in-memory message per logical frame.
///
/// Wire messages from both protocol major versions normalize into this
/// enum. Data-quality gaps (a frame with no updates, an unresolvable
/// timestamp) surface as [`XvizMessage::Incomplete`] rather than Rust
/// errors so stream consumers can skip a frame and continue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum XvizMessage {
    /// Log-level metadata, sent once at stream start.
    Metadata(Metadata),
    /// One frame of stream data at a resolved timestamp.
    Timeslice(Timeslice),
    /// A structurally deficient frame, with the reason spelled out.
    Incomplete { message: String },
    /// An error reported by the producer inside the stream.
    Error { message: String },
    /// A transform/export operation completed.
    Done { id: Option<String> },
}

impl XvizMessage {
    /// Whether this message carries frame data.
    pub fn is_timeslice(&self) -> bool {
        matches!(self, XvizMessage::Timeslice(_))
    }

    /// The frame timestamp, when this message has one.
    pub fn timestamp(&self) -> Option<f64> {
        match self {
            XvizMessage::Timeslice(slice) => Some(slice.timestamp),
            _ => None,
        }
    }
}

/// Log-level metadata.
///
/// Event times bound the interesting window of the log; log times bound the
/// full recording. Producers that report only one pair get the other pair
/// mirrored from it during normalization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Declared protocol version string, e.g. `"2.0.0"`.
    pub version: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub log_start_time: Option<f64>,
    pub log_end_time: Option<f64>,
}

impl Metadata {
    /// Parse the major component of the declared version string.
    ///
    /// `"2.0.0"` yields `Some(2)`; a missing or unparseable version yields
    /// `None`.
    pub fn major_version(&self) -> Option<u32> {
        self.version.split('.').next().and_then(|major| major.parse().ok())
    }
}

/// One frame of stream data.
///
/// `streams` maps stream names to their merged per-frame payload. The map is
/// ordered so that iteration (and the pose-timestamp tie-break that depends
/// on it) is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeslice {
    pub timestamp: f64,
    pub streams: BTreeMap<String, StreamEntry>,
}

impl Timeslice {
    pub fn new(timestamp: f64) -> Self {
        Self { timestamp, streams: BTreeMap::new() }
    }
}
