//! CCSDS path service: packet reassembly from frame data zones
//!
//! The working set is owned by one [`PathService`] and reused across frames:
//!
//! - [`PacketZone`]: cursor over the current frame's data zone
//! - [`SplitHeader`]: primary header bytes carried over a frame boundary
//! - [`PacketCaddy`]: fill position of the packet being assembled
//! - [`PacketList`]: pooled packet buffers
//!
//! ## Usage Example
//!
//! ```rust
//! use downlink::config::{FrameLayoutConfig, PathConfig};
//! use downlink::frame::FrameLayout;
//! use downlink::path::PathService;
//! use downlink::types::Packet;
//!
//! let layout = FrameLayout::new(&FrameLayoutConfig::default())?;
//! let mut service = PathService::new(&PathConfig::default(), layout, Vec::<Packet>::new())?;
//! assert_eq!(service.counters().packets, 0);
//! # Ok::<(), downlink::TelemetryError>(())
//! ```

mod caddy;
mod list;
mod service;
mod split_header;
mod zone;

pub use caddy::PacketCaddy;
pub use list::PacketList;
pub use service::{PathService, PathStatus, State};
pub use split_header::SplitHeader;
pub use zone::PacketZone;

#[cfg(test)]
mod tests;
