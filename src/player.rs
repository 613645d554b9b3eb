//! Log playback over watch channels.
//!
//! [`LogPlayer`] spawns a reader task that owns a [`PlaybackProvider`] and
//! an [`XvizSession`], parses every frame into its canonical form, and
//! publishes the results over watch channels. Subscribers get latest-wins
//! fan-out with optional rate capping; dropping the player cancels the
//! task.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::XvizConfig;
use crate::provider::PlaybackProvider;
use crate::session::{FrameResult, XvizSession};
use crate::stream::PaceExt;
use crate::types::{Metadata, XvizMessage};

/// Handle to a running playback task.
pub struct LogPlayer {
    /// Frame watch receiver
    frames: watch::Receiver<Option<Arc<XvizMessage>>>,

    /// Metadata watch receiver
    metadata: watch::Receiver<Option<Arc<Metadata>>>,

    /// Cancellation token for stopping the reader task
    cancel: CancellationToken,
}

impl LogPlayer {
    /// Spawn the reader task for the given provider.
    pub fn spawn<P>(provider: P, config: XvizConfig) -> Self
    where
        P: PlaybackProvider,
    {
        let (frame_tx, frame_rx) = watch::channel(None);
        let (metadata_tx, metadata_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let session = XvizSession::new(config);
        let cancel_reader = cancel.clone();
        tokio::spawn(async move {
            Self::reader_task(provider, session, frame_tx, metadata_tx, cancel_reader).await;
        });

        Self { frames: frame_rx, metadata: metadata_rx, cancel }
    }

    /// Subscribe to canonical messages.
    ///
    /// `max_rate` caps delivery in Hz with latest-wins semantics; `None`
    /// delivers at the playback rate.
    pub fn subscribe(&self, max_rate: Option<f64>) -> impl Stream<Item = Arc<XvizMessage>> + 'static {
        let frames = WatchStream::new(self.frames.clone()).filter_map(|opt| async move { opt });
        match max_rate {
            Some(hz) => frames.pace(hz).boxed(),
            None => frames.boxed(),
        }
    }

    /// The most recently published frame, if any.
    pub fn current_frame(&self) -> Option<Arc<XvizMessage>> {
        self.frames.borrow().clone()
    }

    /// The log's parsed metadata, once the reader has seen it.
    pub fn current_metadata(&self) -> Option<Arc<Metadata>> {
        self.metadata.borrow().clone()
    }

    /// Stop the reader task.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Reader task - parses the metadata message, then streams frames until
    /// the log ends, the receivers drop, or the task is cancelled.
    async fn reader_task<P>(
        mut provider: P,
        mut session: XvizSession,
        frame_tx: watch::Sender<Option<Arc<XvizMessage>>>,
        metadata_tx: watch::Sender<Option<Arc<Metadata>>>,
        cancel: CancellationToken,
    ) where
        P: PlaybackProvider,
    {
        info!("playback reader task started");
        let mut frame_count = 0u64;
        let mut error_count = 0u32;
        const MAX_ERRORS: u32 = 10;

        if let Some(mut data) = provider.metadata() {
            match session.process(&mut data) {
                FrameResult::Message(XvizMessage::Metadata(metadata)) => {
                    debug!(version = %metadata.version, "log metadata parsed");
                    let _ = metadata_tx.send(Some(Arc::new(metadata)));
                }
                FrameResult::Message(other) => {
                    warn!(?other, "log metadata slot held a non-metadata message");
                }
                FrameResult::Ignored => debug!("log metadata is not an XVIZ message"),
                FrameResult::Failed(err) => warn!(error = %err, "failed to parse log metadata"),
            }
        }

        loop {
            if cancel.is_cancelled() {
                info!("playback reader cancelled");
                break;
            }

            // Allow cancellation during the paced wait inside next_frame()
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("playback reader cancelled during read");
                    break;
                }
                result = provider.next_frame() => result,
            };

            match result {
                Ok(Some(mut data)) => match session.process(&mut data) {
                    FrameResult::Message(message) => {
                        frame_count += 1;
                        error_count = 0;
                        trace!(frame_count, "frame parsed");
                        if frame_tx.send(Some(Arc::new(message))).is_err() {
                            debug!("frame receiver dropped, shutting down");
                            break;
                        }
                    }
                    FrameResult::Ignored => {
                        trace!("skipping non-XVIZ frame");
                    }
                    FrameResult::Failed(err) => {
                        error_count += 1;
                        warn!(error = %err, "frame failed ({}/{})", error_count, MAX_ERRORS);
                        if error_count >= MAX_ERRORS {
                            error!("too many frame failures, shutting down");
                            let _ = frame_tx.send(None);
                            break;
                        }
                    }
                },
                Ok(None) => {
                    info!("log ended after {} frames", frame_count);
                    let _ = frame_tx.send(None);
                    break;
                }
                Err(e) => {
                    // Provider error - don't crash on transient failures
                    error_count += 1;
                    error!("provider error ({}/{}): {}", error_count, MAX_ERRORS, e);

                    if error_count >= MAX_ERRORS {
                        error!("too many provider errors, shutting down");
                        let _ = frame_tx.send(None);
                        break;
                    }

                    // Exponential backoff: 50ms, 100ms, 200ms, ...
                    let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!("playback reader task ended (processed {} frames)", frame_count);
    }
}

impl Drop for LogPlayer {
    fn drop(&mut self) {
        debug!("dropping log player");
        self.cancel.cancel();
    }
}
