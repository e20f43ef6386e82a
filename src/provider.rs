//! Provider trait for frame sources

use crate::types::Frame;
use crate::Result;

/// Source of fixed-length transfer frames.
///
/// Providers handle their own pacing; the driver just awaits the next frame.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Get the next frame
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - New frame available
    /// - `Ok(None)` - Source exhausted (normal termination)
    /// - `Err(e)` - Read failure; the driver retries with backoff
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Length of every frame this provider yields.
    fn frame_length(&self) -> usize;
}
