//! Frame source collaborator.
//!
//! Log storage and indexing live outside this library; playback consumes
//! them through the narrow [`XvizSource`] trait. [`MemorySource`] is the
//! in-memory implementation used by the playback layer's tests and by
//! applications that assemble logs on the fly.

use crate::data::XvizData;

/// Time bounds of a log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start_time: f64,
    pub end_time: f64,
}

/// Read-only access to a recorded log.
pub trait XvizSource: Send {
    /// Time bounds covered by the log's frames.
    fn time_range(&self) -> TimeRange;

    /// Index window `[start, end]` bracketing `timestamp`, or `None` when
    /// the timestamp falls outside the log.
    fn find_frame(&self, timestamp: f64) -> Option<(usize, usize)>;

    /// Frame at `index`, or `None` past the end of the log.
    fn read_frame(&self, index: usize) -> Option<XvizData>;

    /// The log's metadata message, when it has one.
    fn read_metadata(&self) -> Option<XvizData>;

    /// Total number of frames.
    fn frame_count(&self) -> usize;
}

/// An in-memory log: optional metadata plus timestamped frames.
#[derive(Default)]
pub struct MemorySource {
    metadata: Option<XvizData>,
    frames: Vec<(f64, XvizData)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: XvizData) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Append a frame. Frames must be pushed in timestamp order.
    pub fn push_frame(&mut self, timestamp: f64, data: XvizData) {
        debug_assert!(
            self.frames.last().map(|(t, _)| *t <= timestamp).unwrap_or(true),
            "frames must be appended in timestamp order"
        );
        self.frames.push((timestamp, data));
    }
}

impl XvizSource for MemorySource {
    fn time_range(&self) -> TimeRange {
        let start_time = self.frames.first().map(|(t, _)| *t).unwrap_or(0.0);
        let end_time = self.frames.last().map(|(t, _)| *t).unwrap_or(start_time);
        TimeRange { start_time, end_time }
    }

    fn find_frame(&self, timestamp: f64) -> Option<(usize, usize)> {
        let first = self.frames.first().map(|(t, _)| *t)?;
        if timestamp < first {
            return None;
        }
        // Last frame at or before the timestamp.
        let start = self.frames.partition_point(|(t, _)| *t <= timestamp) - 1;
        let end = (start + 1).min(self.frames.len() - 1);
        Some((start, end))
    }

    fn read_frame(&self, index: usize) -> Option<XvizData> {
        self.frames.get(index).map(|(_, data)| data.clone())
    }

    fn read_metadata(&self) -> Option<XvizData> {
        self.metadata.clone()
    }

    fn frame_count(&self) -> usize {
        self.frames.len()
    }
}
