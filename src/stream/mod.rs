//! Stream combinators for playback fan-out.

mod pace;

pub use pace::{Pace, PaceExt};
