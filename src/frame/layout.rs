//! Frame layout computed once from configuration
//!
//! ## Frame Structure
//!
//! ```text
//! | sync (0|4) | VCDU header (6) | HEC (0|2) | insert zone | data zone | OCF (0|4) | CRC (0|2) | RS parity |
//! ```
//!
//! The data zone starts with the 2-byte first-header pointer (packet
//! service) or bitstream data pointer (bitstream service). All offsets are
//! relative to the first byte of the frame as delivered, sync marker
//! included when present.

use tracing::debug;

use crate::config::{FrameFormat, FrameLayoutConfig};
use crate::{Result, TelemetryError};

/// CCSDS attached sync marker.
pub const ATTACHED_SYNC_MARKER: [u8; 4] = [0x1A, 0xCF, 0xFC, 0x1D];
pub const VCDU_HEADER_LENGTH: usize = 6;
pub const HEADER_ERROR_CONTROL_LENGTH: usize = 2;
pub const OCF_LENGTH: usize = 4;
pub const CRC_LENGTH: usize = 2;
/// Length of the first-header pointer / bitstream data pointer.
pub const DATA_POINTER_LENGTH: usize = 2;

/// One VCDU header field as a big-endian bit range over the 6-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderField {
    pub bit_position: u32,
    pub bit_length: u32,
}

impl HeaderField {
    pub const VERSION: HeaderField = HeaderField { bit_position: 0, bit_length: 2 };
    pub const SPACECRAFT_ID: HeaderField = HeaderField { bit_position: 2, bit_length: 8 };
    pub const VIRTUAL_CHANNEL_ID: HeaderField = HeaderField { bit_position: 10, bit_length: 6 };
    /// Spacecraft and virtual channel together
    pub const VCDU_ID: HeaderField = HeaderField { bit_position: 2, bit_length: 14 };
    pub const FRAME_COUNT: HeaderField = HeaderField { bit_position: 16, bit_length: 24 };
    pub const REPLAY: HeaderField = HeaderField { bit_position: 40, bit_length: 1 };
    pub const FRAME_COUNT_USAGE: HeaderField = HeaderField { bit_position: 41, bit_length: 1 };
    pub const FRAME_COUNT_CYCLE: HeaderField = HeaderField { bit_position: 44, bit_length: 4 };

    /// Extract this field from `header`. Bits past the end of the slice read
    /// as zero.
    pub fn extract(self, header: &[u8]) -> u32 {
        let mut value: u64 = 0;
        for i in 0..VCDU_HEADER_LENGTH {
            value = (value << 8) | header.get(i).copied().unwrap_or(0) as u64;
        }
        let shift = (VCDU_HEADER_LENGTH as u32 * 8) - self.bit_position - self.bit_length;
        ((value >> shift) & ((1u64 << self.bit_length) - 1)) as u32
    }
}

/// Byte offsets of every frame region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    format: FrameFormat,
    frame_length: usize,
    header_start: usize,
    insert_zone_start: usize,
    data_zone_start: usize,
    /// Inclusive
    data_zone_end: usize,
    ocf_start: Option<usize>,
    crc_start: Option<usize>,
    rs_parity_length: usize,
}

impl FrameLayout {
    /// Compute and validate offsets. The data zone must hold the 2-byte data
    /// pointer and at least one byte of data.
    pub fn new(config: &FrameLayoutConfig) -> Result<Self> {
        if config.sync_marker_length != 0 && config.sync_marker_length != 4 {
            return Err(TelemetryError::config_error(
                "frame",
                format!("sync_marker_length must be 0 or 4, got {}", config.sync_marker_length),
            ));
        }

        let header_start = config.sync_marker_length;
        let hec = if config.header_error_control { HEADER_ERROR_CONTROL_LENGTH } else { 0 };
        let insert_zone_start = header_start + VCDU_HEADER_LENGTH + hec;
        let data_zone_start = insert_zone_start + config.insert_zone_length;

        let trailer = config.rs_parity_length
            + if config.has_crc { CRC_LENGTH } else { 0 }
            + if config.has_ocf { OCF_LENGTH } else { 0 };

        let minimum = data_zone_start + DATA_POINTER_LENGTH + 1 + trailer;
        if config.frame_length < minimum {
            return Err(TelemetryError::config_error(
                "frame",
                format!(
                    "frame_length {} leaves no data zone (need at least {} bytes)",
                    config.frame_length, minimum
                ),
            ));
        }

        let rs_start = config.frame_length - config.rs_parity_length;
        let crc_start = config.has_crc.then(|| rs_start - CRC_LENGTH);
        let ocf_start = config
            .has_ocf
            .then(|| crc_start.unwrap_or(rs_start) - OCF_LENGTH);
        let data_zone_end = ocf_start.or(crc_start).unwrap_or(rs_start) - 1;

        let layout = Self {
            format: config.format,
            frame_length: config.frame_length,
            header_start,
            insert_zone_start,
            data_zone_start,
            data_zone_end,
            ocf_start,
            crc_start,
            rs_parity_length: config.rs_parity_length,
        };
        debug!(
            "Frame layout: length={}, data zone {}..={}, ocf={:?}, crc={:?}",
            layout.frame_length, layout.data_zone_start, layout.data_zone_end, layout.ocf_start, layout.crc_start
        );
        Ok(layout)
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn header_start(&self) -> usize {
        self.header_start
    }

    pub fn insert_zone(&self) -> std::ops::Range<usize> {
        self.insert_zone_start..self.data_zone_start
    }

    /// Offset of the first-header pointer (or bitstream data pointer).
    pub fn data_zone_start(&self) -> usize {
        self.data_zone_start
    }

    /// Inclusive offset of the last data zone byte.
    pub fn data_zone_end(&self) -> usize {
        self.data_zone_end
    }

    /// Offset of the first byte after the data pointer.
    pub fn data_start(&self) -> usize {
        self.data_zone_start + DATA_POINTER_LENGTH
    }

    pub fn ocf_start(&self) -> Option<usize> {
        self.ocf_start
    }

    pub fn crc_start(&self) -> Option<usize> {
        self.crc_start
    }

    /// Bytes covered by the frame CRC (header through OCF, sync excluded).
    pub fn crc_coverage(&self) -> Option<std::ops::Range<usize>> {
        self.crc_start.map(|crc| self.header_start..crc)
    }

    /// Region handed to a Reed-Solomon decoder: header through parity.
    pub fn codeblock(&self) -> std::ops::Range<usize> {
        self.header_start..self.frame_length
    }

    pub fn rs_parity_length(&self) -> usize {
        self.rs_parity_length
    }

    /// Reject frames whose byte count differs from the layout.
    pub fn check_length(&self, found: usize) -> Result<()> {
        if found != self.frame_length {
            return Err(TelemetryError::FrameLength { expected: self.frame_length, found });
        }
        Ok(())
    }
}
