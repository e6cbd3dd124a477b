//! The ledger's clock.
//!
//! Every "now" used for price versioning, purchases and leaderboard windows
//! comes from a [`TimeSource`]. With the `mock-time` feature the clock only
//! moves when a test moves it.

use jiff::{SignedDuration, Timestamp};
#[cfg(feature = "mock-time")]
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct TimeSource {
    #[cfg(feature = "mock-time")]
    time: Arc<Mutex<Timestamp>>,
}

impl TimeSource {
    #[allow(clippy::new_without_default)]
    #[cfg(not(feature = "mock-time"))]
    pub fn new() -> Self {
        Self {}
    }

    #[cfg(feature = "mock-time")]
    pub fn new(initial_time: Timestamp) -> Self {
        Self {
            time: Arc::new(Mutex::new(initial_time)),
        }
    }

    #[cfg(not(feature = "mock-time"))]
    pub fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    #[cfg(feature = "mock-time")]
    pub fn now(&self) -> Timestamp {
        *self.clock()
    }

    #[cfg(feature = "mock-time")]
    pub fn advance(&self, duration: SignedDuration) {
        *self.clock() += duration;
    }

    #[cfg(feature = "mock-time")]
    pub fn set(&self, time: Timestamp) {
        *self.clock() = time;
    }

    /// A poisoned clock still holds a valid timestamp.
    #[cfg(feature = "mock-time")]
    fn clock(&self) -> std::sync::MutexGuard<'_, Timestamp> {
        self.time.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A trailing window `[start, end]` ending at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Window {
    /// The window of length `length` ending at `end`.
    pub fn trailing(
        end: Timestamp,
        length: SignedDuration,
    ) -> Result<Self, jiff::Error> {
        Ok(Self {
            start: end.checked_sub(length)?,
            end,
        })
    }
}
