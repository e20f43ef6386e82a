//! Core data model: frames, packets and their quality annotations.
//!
//! ## Ownership
//!
//! - [`Frame`] owns its byte buffer until it is handed downstream, and carries
//!   a [`FrameAnnotation`] by value.
//! - [`Packet`] is a pooled buffer owned by the reassembler. Receivers borrow
//!   it mutably for one delivery call.
//! - Annotations are `Copy`; a packet assembled from several frames merges
//!   their annotations with [`FrameAnnotation::add_quality`].
//!
//! ## Usage Example
//!
//! ```rust
//! use downlink::types::{FrameAnnotation, Packet};
//!
//! let bytes = [0x08, 0x40, 0xC0, 0x05, 0x00, 0x01, 0xAA, 0xBB];
//! let packet = Packet::from_bytes(&bytes).expect("complete packet");
//! assert_eq!(packet.application_id(), 0x040);
//! assert_eq!(packet.sequence_count(), 5);
//! assert_eq!(packet.declared_length(), Some(8));
//!
//! let mut annotation = FrameAnnotation::new(1_700_000_000_000);
//! annotation.set_crc_error(true);
//! assert!(annotation.has_crc_error());
//! ```

mod annotation;
mod frame;
mod packet;
pub mod quality_flags;
mod status;
mod time;
mod update_rate;

pub use annotation::{FrameAnnotation, QualityFlags};
pub use frame::Frame;
pub use packet::{IDLE_APID, PRIMARY_HEADER_LENGTH, Packet, PacketAnnotation, PacketLength};
pub use status::{ComponentStatus, StatusItem, StatusReporter, StatusSnapshot};
pub use time::{CCSDS_EPOCH_OFFSET_DAYS, CdsTime, day_of_year_and_millis, file_name_stamp};
pub use update_rate::UpdateRate;

/// Compare sequence counters in a `bits`-wide space with wraparound using the
/// half-range rule. Returns true if `a` is considered newer than `b`.
pub fn count_after(a: u32, b: u32, bits: u32) -> bool {
    let mask = (1u32 << bits) - 1;
    let diff = a.wrapping_sub(b) & mask;
    diff != 0 && diff < (1 << (bits - 1))
}
