//! Update rate control for status streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a status subscriber wants snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every snapshot the driver publishes (one per processed frame)
    EveryFrame,

    /// At most this many snapshots per second; intermediate ones are coalesced
    Max(u32),
}

impl UpdateRate {
    /// Interval between snapshots, or `None` when no throttling is needed.
    ///
    /// `Max(0)` is treated as `EveryFrame`.
    pub fn throttle_interval(self) -> Option<Duration> {
        match self {
            UpdateRate::EveryFrame | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
