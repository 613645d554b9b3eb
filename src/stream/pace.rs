//! Stream pacing utilities

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, interval};

/// Extension trait to cap the update rate of any Stream
pub trait PaceExt: Stream {
    /// Emit at most `max_hz` items per second.
    ///
    /// Uses "latest-wins" semantics - if multiple items arrive
    /// during one period, only the latest is emitted. Subscribers that fall
    /// behind therefore skip frames rather than lag.
    fn pace(self, max_hz: f64) -> Pace<Self>
    where
        Self: Sized,
    {
        Pace::new(self, max_hz)
    }
}

impl<T: Stream> PaceExt for T {}

pin_project! {
    /// A stream combinator that caps emission rate
    pub struct Pace<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        pending: Option<S::Item>,
    }
}

impl<S: Stream> Pace<S> {
    /// Create a new paced stream
    pub fn new(stream: S, max_hz: f64) -> Self {
        let period = Duration::from_secs_f64(1.0 / max_hz.max(1e-3));
        let mut interval = interval(period);
        // Set missed tick behavior to delay (don't burst)
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        Self { stream, interval, pending: None }
    }
}

impl<S: Stream> Stream for Pace<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Wait for the next period
        ready!(this.interval.poll_tick(cx));

        // Drain all available items, keeping only the latest
        loop {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    *this.pending = Some(item);
                    // Continue draining
                }
                Poll::Ready(None) => {
                    // Stream ended
                    return Poll::Ready(this.pending.take());
                }
                Poll::Pending => {
                    // No more items available right now. An empty period
                    // stays pending rather than ending the stream; the
                    // inner stream's waker re-arms this poll.
                    return match this.pending.take() {
                        Some(item) => Poll::Ready(Some(item)),
                        None => Poll::Pending,
                    };
                }
            }
        }
    }
}
