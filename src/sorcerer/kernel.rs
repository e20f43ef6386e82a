//! Packet timing keys and secondary header time codes

use std::cmp::Ordering;

use crate::config::TimeCodeConfig;
use crate::types::{CdsTime, Packet, PRIMARY_HEADER_LENGTH};

const SECONDS_PER_DAY: u64 = 86_400;

/// Secondary header time format of one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeCode {
    /// 8-byte day segmented time: days (16), ms of day (32), µs (16)
    Cds,
    /// 4 coarse octets of seconds plus `fine_bytes` binary fraction octets,
    /// counted from `epoch_offset_seconds` after 1958-01-01
    Cuc { fine_bytes: u8, epoch_offset_seconds: i64 },
}

impl TimeCode {
    pub fn from_config(config: &TimeCodeConfig) -> Self {
        match *config {
            TimeCodeConfig::Cds => TimeCode::Cds,
            TimeCodeConfig::Cuc { fine_bytes, epoch_offset_seconds } => {
                TimeCode::Cuc { fine_bytes, epoch_offset_seconds }
            }
        }
    }

    /// Read the packet time. Packets without a secondary header, or too
    /// short to hold one, have no time.
    pub fn packet_time(&self, packet: &Packet) -> Option<CdsTime> {
        if !packet.has_secondary_header() {
            return None;
        }
        let field = packet.bytes().get(PRIMARY_HEADER_LENGTH..)?;
        match *self {
            TimeCode::Cds => {
                let raw: [u8; 8] = field.get(..8)?.try_into().ok()?;
                Some(CdsTime(u64::from_be_bytes(raw)))
            }
            TimeCode::Cuc { fine_bytes, epoch_offset_seconds } => {
                let width = 4 + fine_bytes as usize;
                let raw = field.get(..width)?;
                let coarse = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64;
                let fine = raw[4..].iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
                Some(cuc_to_cds(coarse + epoch_offset_seconds, fine, fine_bytes))
            }
        }
    }
}

/// Convert seconds since 1958 plus a binary fraction to CDS.
fn cuc_to_cds(seconds: i64, fine: u64, fine_bytes: u8) -> CdsTime {
    if seconds < 0 {
        return CdsTime(0);
    }
    let seconds = seconds as u64;
    let micros_of_second = (fine * 1_000_000) >> (8 * fine_bytes as u32);
    let days = (seconds / SECONDS_PER_DAY).min(u16::MAX as u64) as u16;
    let millis = (seconds % SECONDS_PER_DAY) * 1000 + micros_of_second / 1000;
    CdsTime::from_parts(days, millis as u32, (micros_of_second % 1000) as u16)
}

/// Timing key of one accepted packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketKernel {
    /// Ground receive time of the first frame carrying the packet
    pub esh_time: CdsTime,
    /// Spacecraft time from the secondary header, zero when absent
    pub packet_time: CdsTime,
    pub sequence: u16,
    /// Offset of the packet within its dataset
    pub byte_offset: u64,
}

impl PacketKernel {
    pub fn new(packet: &Packet, time_code: &TimeCode, byte_offset: u64) -> Self {
        Self {
            esh_time: packet.frame_annotation.esh_time(),
            packet_time: time_code.packet_time(packet).unwrap_or_default(),
            sequence: packet.sequence_count(),
            byte_offset,
        }
    }

    /// Order by packet time only.
    pub fn time_order(&self, other: &PacketKernel) -> Ordering {
        self.packet_time.cmp(&other.packet_time)
    }
}
