//! Provider trait for playback frame delivery.

use crate::data::XvizData;
use crate::source::XvizSource;
use crate::{Result, XvizError};
use tokio::time::{Duration, Interval, interval};
use tracing::{debug, trace};

/// Trait for paced frame delivery during playback.
///
/// Providers abstract over where frames come from and handle their own
/// timing internally. The trait is deliberately small: one method pulls the
/// next raw frame, the others expose log metadata and the native rate.
#[async_trait::async_trait]
pub trait PlaybackProvider: Send + 'static {
    /// Get the next raw frame.
    ///
    /// Returns:
    /// - `Ok(Some(data))` - next frame, in whatever wire representation the
    ///   log stores
    /// - `Ok(None)` - end of log (normal termination)
    /// - `Err(e)` - error occurred
    async fn next_frame(&mut self) -> Result<Option<XvizData>>;

    /// The log's metadata message, when the source has one.
    fn metadata(&self) -> Option<XvizData>;

    /// Native frame rate in Hz.
    fn frame_rate(&self) -> f64;
}

/// Default playback rate when a log does not imply one.
pub const DEFAULT_FRAME_RATE_HZ: f64 = 10.0;

/// Plays a recorded log from any [`XvizSource`] at a configurable speed.
pub struct LogProvider<S> {
    source: S,
    cursor: usize,

    /// Playback speed multiplier (1.0 = real time, 2.0 = double speed)
    speed: f64,

    /// Frame pacing interval
    interval: Interval,

    /// Native frame rate
    frame_rate: f64,
}

impl<S: XvizSource> LogProvider<S> {
    /// Create a provider playing at [`DEFAULT_FRAME_RATE_HZ`].
    pub fn new(source: S) -> Self {
        Self::with_frame_rate(source, DEFAULT_FRAME_RATE_HZ)
    }

    pub fn with_frame_rate(source: S, frame_rate: f64) -> Self {
        let frame_rate = frame_rate.max(0.1);
        let interval = interval(Duration::from_secs_f64(1.0 / frame_rate));
        debug!(frames = source.frame_count(), frame_rate, "opened log for playback");
        Self { source, cursor: 0, speed: 1.0, interval, frame_rate }
    }

    /// Set playback speed.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.1, 10.0);
        let frame_duration = Duration::from_secs_f64(1.0 / (self.frame_rate * self.speed));
        self.interval = interval(frame_duration);
        debug!("playback speed set to {}x", self.speed);
    }

    /// Seek to the frame bracketing `timestamp`.
    pub fn seek(&mut self, timestamp: f64) -> Result<()> {
        let (start, _) = self.source.find_frame(timestamp).ok_or_else(|| {
            XvizError::source_failed(format!("timestamp {timestamp} is outside the log"))
        })?;
        debug!(timestamp, frame = start, "seeking playback");
        self.cursor = start;
        Ok(())
    }

    /// Current playback position in seconds from log start.
    pub fn current_time(&self) -> f64 {
        self.cursor as f64 / self.frame_rate
    }

    /// Total log duration in seconds.
    pub fn duration(&self) -> f64 {
        self.source.frame_count() as f64 / self.frame_rate
    }
}

#[async_trait::async_trait]
impl<S: XvizSource + 'static> PlaybackProvider for LogProvider<S> {
    async fn next_frame(&mut self) -> Result<Option<XvizData>> {
        if self.cursor >= self.source.frame_count() {
            debug!("reached end of log");
            return Ok(None);
        }

        // Wait for next frame timing (pacing)
        self.interval.tick().await;

        let index = self.cursor;
        self.cursor += 1;
        match self.source.read_frame(index) {
            Some(data) => {
                trace!(frame = index, total = self.source.frame_count(), "read log frame");
                Ok(Some(data))
            }
            None => Err(XvizError::source_failed(format!("frame {index} missing from source"))),
        }
    }

    fn metadata(&self) -> Option<XvizData> {
        self.source.read_metadata()
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }
}
