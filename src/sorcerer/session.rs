//! Capture-session shared state

use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};

/// File-name time shared by every dataset flushed in one session.
///
/// The first dataset to open a file fixes the stamp; [`reset`](Self::reset)
/// at the end of the session lets the next one pick a fresh stamp.
#[derive(Debug, Default)]
pub struct SessionContext {
    timestamp: Mutex<Option<DateTime<Utc>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session stamp, fixing it to now if unset.
    pub fn stamp(&self) -> DateTime<Utc> {
        *self
            .timestamp
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(Utc::now)
    }

    pub fn current(&self) -> Option<DateTime<Utc>> {
        *self.timestamp.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_timestamp(&self, timestamp: DateTime<Utc>) {
        *self.timestamp.lock().unwrap_or_else(PoisonError::into_inner) = Some(timestamp);
    }

    pub fn reset(&self) {
        *self.timestamp.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
