//! Driver task that feeds a provider's frames through the pipeline

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::pipeline::Pipeline;
use crate::provider::Provider;
use crate::sorcerer::ConstructionRecord;
use crate::types::StatusSnapshot;
use crate::Result;

/// Consecutive provider errors tolerated before the source is abandoned.
const MAX_PROVIDER_ERRORS: u32 = 10;
const COMMAND_CAPACITY: usize = 8;

/// Requests handled between frames.
#[derive(Debug)]
pub enum DriverCommand {
    /// End the session and reply with its construction records
    Flush { reply: oneshot::Sender<Result<Vec<ConstructionRecord>>> },
}

/// Handles returned by [`Driver::spawn`]
pub struct DriverChannels {
    /// Latest pipeline status, refreshed after every frame
    pub status: watch::Receiver<Arc<StatusSnapshot>>,
    /// Becomes true once the provider is exhausted
    pub finished: watch::Receiver<bool>,
    pub commands: mpsc::Sender<DriverCommand>,
    /// Cancellation token for shutdown
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

/// Owns the provider and the pipeline on one tokio task.
///
/// Frames are processed strictly in order. Commands are served while the
/// provider is waiting for input, never in the middle of a frame.
pub struct Driver;

impl Driver {
    pub fn spawn<P>(provider: P, pipeline: Pipeline) -> DriverChannels
    where
        P: Provider,
    {
        let (status_tx, status_rx) = watch::channel(Arc::new(pipeline.status()));
        let (finished_tx, finished_rx) = watch::channel(false);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let cancel = CancellationToken::new();

        let cancel_task = cancel.clone();
        let task = tokio::spawn(async move {
            Self::frame_task(provider, pipeline, status_tx, finished_tx, command_rx, cancel_task).await;
        });

        DriverChannels { status: status_rx, finished: finished_rx, commands: command_tx, cancel, task }
    }

    async fn frame_task<P>(
        mut provider: P,
        mut pipeline: Pipeline,
        status_tx: watch::Sender<Arc<StatusSnapshot>>,
        finished_tx: watch::Sender<bool>,
        mut commands: mpsc::Receiver<DriverCommand>,
        cancel: CancellationToken,
    ) where
        P: Provider,
    {
        info!("Frame task started ({}-byte frames)", provider.frame_length());
        let mut error_count = 0u32;
        let mut exhausted = false;
        let mut commands_open = true;

        loop {
            if exhausted {
                // Keep serving commands until the handle goes away
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    command = commands.recv() => match command {
                        Some(command) => Self::handle(command, &mut pipeline, &status_tx),
                        None => break,
                    },
                }
                continue;
            }

            // The read stays in flight while commands are served, so a stalled
            // provider never blocks a flush and no partial read is dropped
            let next = provider.next_frame();
            tokio::pin!(next);
            let result = loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!("Frame task cancelled");
                        break None;
                    }
                    command = commands.recv(), if commands_open => match command {
                        Some(command) => Self::handle(command, &mut pipeline, &status_tx),
                        None => commands_open = false,
                    },
                    result = &mut next => break Some(result),
                }
            };
            let Some(result) = result else {
                break;
            };

            match result {
                Ok(Some(mut frame)) => {
                    error_count = 0;
                    if let Err(e) = pipeline.put_frame(&mut frame) {
                        warn!("Frame {} rejected: {}", pipeline.frames_processed(), e);
                    }
                    trace!("Processed frame {}", pipeline.frames_processed());
                    status_tx.send_replace(Arc::new(pipeline.status()));
                }
                Ok(None) => {
                    info!("Provider exhausted after {} frames", pipeline.frames_processed());
                    Self::finish_session(&mut pipeline, &status_tx);
                    exhausted = true;
                    let _ = finished_tx.send(true);
                }
                Err(e) => {
                    // Provider error - don't give up on transient failures
                    error_count += 1;
                    error!("Provider error ({}/{}): {}", error_count, MAX_PROVIDER_ERRORS, e);
                    if error_count >= MAX_PROVIDER_ERRORS {
                        error!("Too many provider errors, ending session");
                        Self::finish_session(&mut pipeline, &status_tx);
                        exhausted = true;
                        let _ = finished_tx.send(true);
                        continue;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ... capped at 1.6s
                    let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!("Frame task ended (processed {} frames)", pipeline.frames_processed());
    }

    fn handle(command: DriverCommand, pipeline: &mut Pipeline, status_tx: &watch::Sender<Arc<StatusSnapshot>>) {
        match command {
            DriverCommand::Flush { reply } => {
                debug!("Flush requested");
                let result = pipeline.flush();
                status_tx.send_replace(Arc::new(pipeline.status()));
                if reply.send(result).is_err() {
                    debug!("Flush requester went away");
                }
            }
        }
    }

    fn finish_session(pipeline: &mut Pipeline, status_tx: &watch::Sender<Arc<StatusSnapshot>>) {
        match pipeline.flush() {
            Ok(records) => info!("End of input: wrote {} construction record(s)", records.len()),
            Err(e) => error!("Final flush failed: {}", e),
        }
        status_tx.send_replace(Arc::new(pipeline.status()));
    }
}
