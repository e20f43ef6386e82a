//! Frame quality annotation
//!
//! A [`FrameAnnotation`] is a small `Copy` value. Units derived from a frame
//! take a copy when they are created; a packet that spans several frames folds
//! each contributing frame's annotation in with [`FrameAnnotation::add_quality`].
//! There is no shared mutable annotation: the only copy point is explicit.

use serde::{Deserialize, Serialize};

use super::quality_flags;
use super::time::{CdsTime, day_of_year_and_millis};

/// Quality bitfield (see [`quality_flags`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualityFlags(pub u16);

impl QualityFlags {
    pub fn new(value: u16) -> Self {
        Self(value & quality_flags::ALL)
    }

    /// Check if a specific flag is set using a bitmask.
    pub fn has_flag(&self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    pub fn set(&mut self, flag: u16, on: bool) {
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }

    /// Get the raw value.
    pub fn value(&self) -> u16 {
        self.0
    }
}

/// Per-frame quality bits plus the frame's receive time (Unix milliseconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameAnnotation {
    pub quality: QualityFlags,
    pub timestamp_ms: i64,
}

macro_rules! quality_accessors {
    ($($get:ident, $set:ident => $flag:path;)*) => {
        $(
            pub fn $get(&self) -> bool {
                self.quality.has_flag($flag)
            }

            pub fn $set(&mut self, on: bool) {
                self.quality.set($flag, on);
            }
        )*
    };
}

impl FrameAnnotation {
    pub fn new(timestamp_ms: i64) -> Self {
        Self { quality: QualityFlags::default(), timestamp_ms }
    }

    quality_accessors! {
        is_locked, set_locked => quality_flags::LOCK;
        is_inverted, set_inverted => quality_flags::INVERTED;
        is_slipped, set_slipped => quality_flags::SLIPPED;
        has_crc_error, set_crc_error => quality_flags::CRC_ERROR;
        is_rs_corrected, set_rs_corrected => quality_flags::RS_CORRECTED;
        is_rs_uncorrectable, set_rs_uncorrectable => quality_flags::RS_UNCORRECTABLE;
        has_sequence_error, set_sequence_error => quality_flags::SEQUENCE_ERROR;
        has_packet_decomposition_error, set_packet_decomposition_error => quality_flags::PACKET_DECOMPOSITION_ERROR;
        has_bad_first_header_pointer, set_bad_first_header_pointer => quality_flags::BAD_FIRST_HEADER_POINTER;
        is_idle_vcdu, set_idle_vcdu => quality_flags::IDLE_VCDU;
    }

    /// Fold another annotation into this one: quality bits are OR-ed and the
    /// earliest timestamp wins.
    pub fn add_quality(&mut self, other: &FrameAnnotation) {
        self.quality.0 |= other.quality.0;
        self.timestamp_ms = self.timestamp_ms.min(other.timestamp_ms);
    }

    pub fn is_equal_quality(&self, other: &FrameAnnotation) -> bool {
        self.quality == other.quality
    }

    /// Earth station header time of this frame.
    pub fn esh_time(&self) -> CdsTime {
        CdsTime::from_unix_millis(self.timestamp_ms)
    }

    /// Two big-endian words: `[(quality << 16) | day_of_year, millisecond_of_day]`.
    pub fn to_words(&self) -> [u32; 2] {
        let (day, millis) = day_of_year_and_millis(self.timestamp_ms);
        [((self.quality.0 as u32) << 16) | day as u32, millis]
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        let [a, b] = self.to_words();
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&a.to_be_bytes());
        out[4..].copy_from_slice(&b.to_be_bytes());
        out
    }
}
