//! Process-wide timestamps that can travel inside command arguments.
//!
//! A [`Timestamp`] is a plain `f64` number of seconds, so it can be copied
//! into an [`Arg::Float`](crate::Arg::Float) and compared by another stage
//! on another thread. The clock is anchored to the wall clock once per
//! process and advanced by [`Instant`], which makes it non-decreasing.

use std::fmt;
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// `(monotonic anchor, wall-clock seconds at the anchor)`.
static CLOCK_ANCHOR: OnceLock<(Instant, f64)> = OnceLock::new();

fn anchor() -> &'static (Instant, f64) {
    CLOCK_ANCHOR.get_or_init(|| {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        (Instant::now(), wall)
    })
}

/// Seconds since the Unix epoch on the process-wide clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Timestamp(pub f64);

impl Timestamp {
    /// Read the clock. Successive reads on any thread never go backwards.
    pub fn now() -> Self {
        let (instant, wall) = *anchor();
        Self(wall + instant.elapsed().as_secs_f64())
    }

    /// Seconds as `f64`.
    pub fn as_secs_f64(self) -> f64 {
        self.0
    }

    /// Signed interval `self - earlier`, in seconds.
    pub fn seconds_since(self, earlier: Timestamp) -> f64 {
        self.0 - earlier.0
    }

    /// `self + d`.
    pub fn after(self, d: Duration) -> Self {
        Self(self.0 + d.as_secs_f64())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.0)
    }
}
