//! Configured frame-to-dataset pipeline
//!
//! ```text
//! CrcCheck -> ReedSolomonStage -> VcRouter -+-> FrameSequencer -> PathService -> PacketRouter -> PdsHandle...
//!                                           +-> BitstreamService -> AnnotatedWriter
//! ```
//!
//! One [`Pipeline`] owns a capture session. [`Pipeline::flush`] drains the
//! reassemblers, writes a construction record per dataset and resets the
//! shared session stamp.

use std::fs::File;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ChannelService, DownlinkConfig};
use crate::frame::{CrcCheck, FrameLayout, FrameSequencer, PassThroughDecoder, ReedSolomonStage};
use crate::output::AnnotatedWriter;
use crate::path::PathService;
use crate::routing::{BitstreamService, FrameReceiver, PacketRouter, VcRouter};
use crate::sorcerer::{ConstructionRecord, PdsHandle, PdsOutput, SessionContext};
use crate::types::{Frame, StatusSnapshot};
use crate::{Result, TelemetryError};

pub struct Pipeline {
    layout: FrameLayout,
    head: Box<dyn FrameReceiver>,
    datasets: Vec<PdsHandle>,
    session: Arc<SessionContext>,
    frames: u64,
}

impl Pipeline {
    pub fn from_config(config: &DownlinkConfig) -> Result<Self> {
        Self::with_session(config, Arc::new(SessionContext::new()))
    }

    /// Build the pipeline sharing an existing session context.
    pub fn with_session(config: &DownlinkConfig, session: Arc<SessionContext>) -> Result<Self> {
        config.validate()?;
        let layout = FrameLayout::new(&config.frame)?;

        let mut datasets = Vec::new();
        for dataset in &config.datasets {
            let output = PdsOutput::new(dataset, &config.output, session.clone())?;
            datasets.push((dataset, PdsHandle::new(output)));
        }

        let mut router = VcRouter::new(layout.clone(), config.routing.drop_fill_frames);
        for channel in &config.channels {
            let (scid, vcid) = (channel.spacecraft, channel.virtual_channel);
            let service: Box<dyn FrameReceiver> = match channel.service {
                ChannelService::Path => {
                    let mut packets = PacketRouter::new();
                    for (dataset, handle) in &datasets {
                        if dataset.spacecraft != scid {
                            continue;
                        }
                        for appid in dataset.appids.iter().filter(|a| a.vcids.contains(&vcid)) {
                            packets.add_route(appid.id, Box::new(handle.clone()));
                        }
                    }
                    Box::new(PathService::new(&config.path, layout.clone(), packets)?)
                }
                ChannelService::Bitstream => {
                    if datasets.iter().any(|(d, _)| d.spacecraft == scid && d.appids.iter().any(|a| a.vcids.contains(&vcid))) {
                        return Err(TelemetryError::config_error(
                            "channels",
                            format!("datasets cannot read packets from bitstream channel {}/{}", scid, vcid),
                        ));
                    }
                    let path = config.output.directory.join(format!("bitstream_{:03}_{:02}.dat", scid, vcid));
                    std::fs::create_dir_all(&config.output.directory)
                        .map_err(|e| TelemetryError::file_error(config.output.directory.clone(), e))?;
                    let file = File::create(&path).map_err(|e| TelemetryError::file_error(path.clone(), e))?;
                    let writer = AnnotatedWriter::with_error_limit(
                        format!("bitstream {}/{}", scid, vcid),
                        file,
                        config.output.max_consecutive_io_errors,
                    );
                    Box::new(BitstreamService::new(layout.clone(), writer))
                }
            };
            let route: Box<dyn FrameReceiver> = if channel.check_sequence {
                Box::new(FrameSequencer::new(layout.clone(), service))
            } else {
                service
            };
            debug!("Channel {}/{} uses {:?} service", scid, vcid, channel.service);
            router.add_route(scid, vcid, route);
        }

        let quality = &config.quality;
        let decoded = ReedSolomonStage::new(layout.clone(), PassThroughDecoder, quality.delete_rs_uncorrectable, router);
        let head: Box<dyn FrameReceiver> = if quality.check_crc {
            Box::new(CrcCheck::new(layout.clone(), quality.delete_crc_errors, decoded))
        } else {
            Box::new(decoded)
        };

        info!(
            "Pipeline ready: {} channel(s), {} dataset(s), {}-byte frames",
            config.channels.len(),
            datasets.len(),
            layout.frame_length()
        );
        Ok(Self {
            layout,
            head,
            datasets: datasets.into_iter().map(|(_, handle)| handle).collect(),
            session,
            frames: 0,
        })
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn datasets(&self) -> &[PdsHandle] {
        &self.datasets
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    pub fn put_frame(&mut self, frame: &mut Frame) -> Result<()> {
        self.layout.check_length(frame.len())?;
        self.frames += 1;
        self.head.put_frame(frame)
    }

    /// End the session.
    ///
    /// Held partial packets are finalized or discarded per configuration,
    /// every dataset writes its construction record, and the session stamp
    /// is cleared for the next session.
    pub fn flush(&mut self) -> Result<Vec<ConstructionRecord>> {
        self.head.flush()?;
        let mut records = Vec::new();
        let mut failure = None;
        for dataset in &self.datasets {
            match dataset.finish() {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(error) => failure = failure.or(Some(error)),
            }
        }
        self.session.reset();
        info!("Session flushed: {} construction record(s)", records.len());
        match failure {
            Some(error) => Err(error),
            None => Ok(records),
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        let mut components = Vec::new();
        self.head.report_status(&mut components);
        components.extend(self.datasets.iter().map(PdsHandle::component_status));
        StatusSnapshot { frames_processed: self.frames, components }
    }
}
