//! Frame and packet routing
//!
//! Everything downstream of the frame synchronizer is a chain of
//! [`FrameReceiver`]s ending in [`PacketReceiver`]s. Routers fan out by key;
//! several receivers on one key are merged into a broadcaster that delivers
//! in registration order and stops at the first error.

mod bitstream;
mod packet_pipeline;
mod packet_router;
mod receiver;
mod vc_router;

pub use bitstream::{BITSTREAM_IDLE, BitstreamReceiver, BitstreamService};
pub use packet_pipeline::PacketPipeline;
pub use packet_router::PacketRouter;
pub use receiver::{FrameBroadcaster, FrameReceiver, PacketBroadcaster, PacketReceiver, Sink};
pub use vc_router::{VcKey, VcRouter};
