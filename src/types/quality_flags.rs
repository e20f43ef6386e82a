//! Bit assignments for frame quality annotations
//!
//! These are the ten quality bits carried in the high half of the first
//! annotation word written by output channels (`(quality << 16) | day_of_year`).

/// Frame synchronizer was in lock when the frame was delimited.
pub const LOCK: u16 = 0x0001;
/// Frame was received with inverted polarity and corrected.
pub const INVERTED: u16 = 0x0002;
/// Sync marker was found at a slipped bit position.
pub const SLIPPED: u16 = 0x0004;
/// CRC-16 trailer did not match.
pub const CRC_ERROR: u16 = 0x0008;
/// Reed-Solomon decoder corrected at least one symbol.
pub const RS_CORRECTED: u16 = 0x0010;
/// Reed-Solomon decoder could not correct the frame.
pub const RS_UNCORRECTABLE: u16 = 0x0020;
/// Frame counter did not follow its predecessor.
pub const SEQUENCE_ERROR: u16 = 0x0040;
/// Packet reassembly discarded or padded data from this frame.
pub const PACKET_DECOMPOSITION_ERROR: u16 = 0x0080;
/// First-header pointer ran past the end of the packet zone.
pub const BAD_FIRST_HEADER_POINTER: u16 = 0x0100;
/// Frame carried an idle VCDU (first-header pointer 0x7FE).
pub const IDLE_VCDU: u16 = 0x0200;

/// All defined bits.
pub const ALL: u16 = 0x03FF;

// Packet annotation bits (single word: flags above the 16-bit good byte count)
pub mod packet {
    pub const HAS_FILL: u32 = 0x0001_0000;
    pub const INVALID_LENGTH: u32 = 0x0002_0000;
    pub const GOOD_BYTE_COUNT_MASK: u32 = 0x0000_FFFF;
}
