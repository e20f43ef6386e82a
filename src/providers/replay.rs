//! Replay provider for recorded frame files

use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace, warn};

use crate::frame::{ATTACHED_SYNC_MARKER, FrameLayout};
use crate::provider::Provider;
use crate::types::{Frame, FrameAnnotation};
use crate::{Result, TelemetryError};

/// Reads back-to-back fixed-length frame records from a file.
///
/// When the layout includes a sync marker, each record's marker is compared
/// with the attached sync marker and the lock bit set on a match. Frames are
/// stamped with the wall-clock time they are read.
pub struct FrameFileProvider {
    path: PathBuf,
    reader: BufReader<File>,
    layout: FrameLayout,
    /// Optional frame pacing
    interval: Option<Interval>,
    frames: u64,
    unlocked: u64,
}

impl FrameFileProvider {
    pub async fn open<P: AsRef<Path>>(path: P, layout: FrameLayout) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|e| TelemetryError::file_error(path.clone(), e))?;
        let length = file.metadata().await.map(|m| m.len()).unwrap_or(0);
        info!(
            "Opened frame file {} ({} bytes, {} frames of {})",
            path.display(),
            length,
            length / layout.frame_length() as u64,
            layout.frame_length()
        );
        Ok(Self { path, reader: BufReader::new(file), layout, interval: None, frames: 0, unlocked: 0 })
    }

    /// Deliver at most `rate` frames per second.
    pub fn with_rate(mut self, rate: f64) -> Self {
        if rate > 0.0 {
            let mut pacing = interval(Duration::from_secs_f64(1.0 / rate));
            pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.interval = Some(pacing);
            debug!("Replay paced at {} frames/s", rate);
        }
        self
    }

    pub fn frames_read(&self) -> u64 {
        self.frames
    }

    /// Frames whose sync marker did not match.
    pub fn unlocked_frames(&self) -> u64 {
        self.unlocked
    }

    fn annotate(&mut self, bytes: &[u8]) -> FrameAnnotation {
        let mut annotation = FrameAnnotation::new(chrono::Utc::now().timestamp_millis());
        let marker_length = self.layout.header_start();
        let locked = marker_length == 0 || bytes[..marker_length] == ATTACHED_SYNC_MARKER[..marker_length];
        annotation.set_locked(locked);
        if !locked {
            self.unlocked += 1;
            trace!("Frame {} has no sync marker", self.frames);
        }
        annotation
    }
}

#[async_trait::async_trait]
impl Provider for FrameFileProvider {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(pacing) = self.interval.as_mut() {
            pacing.tick().await;
        }

        let mut bytes = vec![0u8; self.layout.frame_length()];
        let mut filled = 0;
        while filled < bytes.len() {
            let read = self
                .reader
                .read(&mut bytes[filled..])
                .await
                .map_err(|e| TelemetryError::file_error(self.path.clone(), e))?;
            if read == 0 {
                break;
            }
            filled += read;
        }

        if filled == 0 {
            debug!("Reached end of {} after {} frames", self.path.display(), self.frames);
            return Ok(None);
        }
        if filled < bytes.len() {
            warn!("Ignoring truncated final record of {} bytes in {}", filled, self.path.display());
            return Ok(None);
        }

        self.frames += 1;
        let annotation = self.annotate(&bytes);
        Ok(Some(Frame::new(bytes, annotation)))
    }

    fn frame_length(&self) -> usize {
        self.layout.frame_length()
    }
}
