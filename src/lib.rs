//! Real-time CCSDS telemetry front end.
//!
//! Downlink takes fixed-length transfer frames as they come off a frame
//! synchronizer and turns them into validated application packets and
//! Sorcerer product datasets.
//!
//! # Features
//!
//! - **Frame handling**: CADU and AOS header views, CRC and Reed-Solomon
//!   quality stages, per-channel frame counter checks
//! - **Packet reassembly**: the Path Service state machine rebuilds packets
//!   spanning any number of frames and pads what a gap cuts short
//! - **Routing**: virtual channel and application ID fan-out, bitstream
//!   extraction
//! - **Datasets**: per-application gap, fill and length accounting with a
//!   byte-exact construction record
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use downlink::{Downlink, DownlinkConfig, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DownlinkConfig::load("downlink.yaml")?;
//!     let session = Downlink::open("/data/pass-0412.cadu", &config).await?;
//!
//!     let mut status = session.status_updates(UpdateRate::Max(2));
//!     while let Some(snapshot) = status.next().await {
//!         println!("{} frames", snapshot.frames_processed);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The synchronous core can also be driven directly:
//!
//! ```rust,no_run
//! use downlink::{DownlinkConfig, Pipeline};
//!
//! # fn frames() -> Vec<downlink::Frame> { Vec::new() }
//! # fn main() -> downlink::Result<()> {
//! let config = DownlinkConfig::load("downlink.yaml")?;
//! let mut pipeline = Pipeline::from_config(&config)?;
//! for mut frame in frames() {
//!     pipeline.put_frame(&mut frame)?;
//! }
//! for record in pipeline.flush()? {
//!     println!("{}: {} packets, {} gaps", record.name, record.total_packets, record.total_gaps);
//! }
//! # Ok(())
//! # }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Processing stages
pub mod config;
pub mod frame;
pub mod output;
pub mod path;
pub mod pipeline;
pub mod routing;
pub mod sequence;
pub mod sorcerer;

// Stream-based session architecture
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

pub use config::DownlinkConfig;
pub use pipeline::Pipeline;
pub use sorcerer::{ConstructionRecord, PdsOutput};

pub use connection::ReplaySession;

/// Entry point for frame replay sessions.
///
/// ```rust,no_run
/// use downlink::{Downlink, DownlinkConfig};
///
/// #[tokio::main]
/// async fn main() -> downlink::Result<()> {
///     let config = DownlinkConfig::load("downlink.yaml")?;
///     let session = Downlink::open("pass.cadu", &config).await?;
///     let status = session.finished().await?;
///     println!("{} frames", status.frames_processed);
///     Ok(())
/// }
/// ```
pub struct Downlink;

impl Downlink {
    /// Replay a recorded frame file through a pipeline built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration fails validation
    /// - A dataset output directory cannot be created
    /// - The frame file cannot be opened
    pub async fn open<P: AsRef<std::path::Path>>(path: P, config: &DownlinkConfig) -> Result<ReplaySession> {
        ReplaySession::open(path, config).await
    }
}
