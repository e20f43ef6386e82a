//! Transfer frame interpretation and frame-level quality stages
//!
//! [`FrameLayout`] is computed once per stream from configuration. Views
//! ([`Cadu`], [`Aos`]) read header fields through it without copying; stages
//! ([`CrcCheck`], [`ReedSolomonStage`], [`FrameSequencer`]) annotate frames
//! and pass them to the next [`FrameReceiver`](crate::routing::FrameReceiver).

mod check;
mod layout;
mod sequencer;
mod view;

pub use check::{CrcCheck, PassThroughDecoder, ReedSolomonDecoder, ReedSolomonStage, RsOutcome, crc16_ccitt};
pub use layout::{
    ATTACHED_SYNC_MARKER, CRC_LENGTH, DATA_POINTER_LENGTH, FrameLayout, HEADER_ERROR_CONTROL_LENGTH, HeaderField, OCF_LENGTH,
    VCDU_HEADER_LENGTH,
};
pub use sequencer::{CaduSequencer, FrameSequencer};
pub use view::{
    AnyView, Aos, BITSTREAM_ALL_VALID, Cadu, FILL_VIRTUAL_CHANNEL, FrameView, IDLE_VCDU, NO_PACKET_HEADER,
};
