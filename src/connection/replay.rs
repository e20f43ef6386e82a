//! Replay session over a recorded frame file

use futures::{Stream, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DownlinkConfig;
use crate::driver::{Driver, DriverCommand};
use crate::pipeline::Pipeline;
use crate::provider::Provider;
use crate::providers::FrameFileProvider;
use crate::sorcerer::ConstructionRecord;
use crate::stream::ThrottleExt;
use crate::types::{StatusSnapshot, UpdateRate};
use crate::{Result, TelemetryError};

/// Handle to a pipeline fed by a provider on a background task.
///
/// Dropping the handle cancels the task. Files already written stay on disk,
/// but a session that was never flushed gets no construction record.
pub struct ReplaySession {
    status: watch::Receiver<Arc<StatusSnapshot>>,
    finished: watch::Receiver<bool>,
    commands: mpsc::Sender<DriverCommand>,
    /// Cancellation token for stopping tasks
    cancel: CancellationToken,
}

impl ReplaySession {
    /// Replay a file of fixed-length frame records through a pipeline built
    /// from `config`.
    pub async fn open<P: AsRef<Path>>(path: P, config: &DownlinkConfig) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening frame file: {}", path.display());

        let pipeline = Pipeline::from_config(config)?;
        let provider = FrameFileProvider::open(path, pipeline.layout().clone()).await?;
        Ok(Self::with_provider(provider, pipeline))
    }

    /// Drive `pipeline` from any provider.
    pub fn with_provider<P: Provider>(provider: P, pipeline: Pipeline) -> Self {
        let channels = Driver::spawn(provider, pipeline);
        Self {
            status: channels.status,
            finished: channels.finished,
            commands: channels.commands,
            cancel: channels.cancel,
        }
    }

    /// Status snapshots as the driver publishes them.
    ///
    /// With [`UpdateRate::Max`] intermediate snapshots are coalesced and only
    /// the latest in each interval is delivered.
    pub fn status_updates(&self, rate: UpdateRate) -> impl Stream<Item = Arc<StatusSnapshot>> + 'static {
        let snapshots = WatchStream::new(self.status.clone());
        match rate.throttle_interval() {
            None => snapshots.boxed(),
            Some(interval) => snapshots.throttle(interval).boxed(),
        }
    }

    pub fn current_status(&self) -> Arc<StatusSnapshot> {
        self.status.borrow().clone()
    }

    /// True once the provider is exhausted and the final flush has run.
    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// Wait for the end of input and return the final status.
    pub async fn finished(&self) -> Result<Arc<StatusSnapshot>> {
        let mut finished = self.finished.clone();
        finished.wait_for(|done| *done).await.map_err(|_| Self::gone())?;
        Ok(self.current_status())
    }

    /// End the current session and return its construction records.
    ///
    /// Handled between frames. Packets are not lost: frames after the flush
    /// start a new session.
    pub async fn flush(&self) -> Result<Vec<ConstructionRecord>> {
        let (reply, response) = oneshot::channel();
        self.commands.send(DriverCommand::Flush { reply }).await.map_err(|_| Self::gone())?;
        response.await.map_err(|_| Self::gone())?
    }

    fn gone() -> TelemetryError {
        TelemetryError::Shutdown { reason: "driver task has stopped".to_string() }
    }
}

impl Drop for ReplaySession {
    fn drop(&mut self) {
        debug!("Dropping replay session");
        self.cancel.cancel();
    }
}
