//! Synthetic frame and packet builders for unit tests and benches
//!
//! Frames produced here follow the configured [`FrameLayout`] exactly: sync
//! marker, VCDU header, optional HEC and insert zone, data pointer, data
//! zone, and a trailer with a valid CRC when the layout has one.

#![cfg(any(test, feature = "benchmark"))]

pub use crate::frame::ATTACHED_SYNC_MARKER as SYNC_MARKER;
use crate::frame::{FrameLayout, IDLE_VCDU, NO_PACKET_HEADER, crc16_ccitt};
use crate::types::{CdsTime, Frame, FrameAnnotation, IDLE_APID};

/// Builds frames for one spacecraft / virtual channel.
#[derive(Debug, Clone)]
pub struct CaduBuilder {
    layout: FrameLayout,
    spacecraft: u16,
    virtual_channel: u8,
    base_time_ms: i64,
}

impl CaduBuilder {
    pub fn new(layout: &FrameLayout, spacecraft: u16, virtual_channel: u8) -> Self {
        Self { layout: layout.clone(), spacecraft, virtual_channel, base_time_ms: 1_700_000_000_000 }
    }

    /// Frame `n` is stamped `base + n` milliseconds.
    pub fn with_base_time(mut self, base_time_ms: i64) -> Self {
        self.base_time_ms = base_time_ms;
        self
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Data bytes a frame carries after its pointer.
    pub fn zone_capacity(&self) -> usize {
        self.layout.data_zone_end() + 1 - self.layout.data_start()
    }

    /// Build a frame with data pointer `pointer`; `data` is truncated or
    /// zero-padded to the zone capacity.
    pub fn frame(&self, count: u32, pointer: u16, data: &[u8]) -> Frame {
        let mut bytes = vec![0u8; self.layout.frame_length()];
        let header_start = self.layout.header_start();
        bytes[..header_start].copy_from_slice(&SYNC_MARKER[..header_start]);

        let scid = self.spacecraft & 0xFF;
        let header = [
            0x40 | (scid >> 2) as u8,
            ((scid & 0x3) as u8) << 6 | (self.virtual_channel & 0x3F),
            (count >> 16) as u8,
            (count >> 8) as u8,
            count as u8,
            0,
        ];
        bytes[header_start..header_start + 6].copy_from_slice(&header);

        let pointer_at = self.layout.data_zone_start();
        bytes[pointer_at..pointer_at + 2].copy_from_slice(&pointer.to_be_bytes());

        let start = self.layout.data_start();
        let take = data.len().min(self.zone_capacity());
        bytes[start..start + take].copy_from_slice(&data[..take]);

        if let Some(coverage) = self.layout.crc_coverage() {
            let crc = crc16_ccitt(&bytes[coverage.clone()]);
            bytes[coverage.end..coverage.end + 2].copy_from_slice(&crc.to_be_bytes());
        }

        let mut annotation = FrameAnnotation::new(self.base_time_ms + count as i64);
        annotation.set_locked(true);
        Frame::new(bytes, annotation)
    }

    pub fn idle_frame(&self, count: u32) -> Frame {
        self.frame(count, IDLE_VCDU, &[])
    }
}

/// A complete packet: primary header, optional 8-byte CDS secondary header
/// time, then a counting byte pattern.
pub fn packet_bytes(apid: u16, sequence: u16, total_length: usize) -> Vec<u8> {
    build_packet(apid, sequence, total_length, None)
}

/// Like [`packet_bytes`] with the secondary header flag set and `time` at
/// byte 6.
pub fn packet_with_time(apid: u16, sequence: u16, total_length: usize, time: CdsTime) -> Vec<u8> {
    build_packet(apid, sequence, total_length, Some(time))
}

fn build_packet(apid: u16, sequence: u16, total_length: usize, time: Option<CdsTime>) -> Vec<u8> {
    assert!(total_length >= 7, "packets are at least 7 bytes");
    let mut bytes = Vec::with_capacity(total_length);
    let secondary = if time.is_some() { 0x08 } else { 0x00 };
    bytes.push(secondary | ((apid >> 8) as u8 & 0x07));
    bytes.push(apid as u8);
    bytes.push(0xC0 | ((sequence >> 8) as u8 & 0x3F));
    bytes.push(sequence as u8);
    bytes.extend_from_slice(&((total_length - 7) as u16).to_be_bytes());
    if let Some(time) = time {
        bytes.extend_from_slice(&time.0.to_be_bytes());
    }
    let mut value = sequence as u8;
    while bytes.len() < total_length {
        bytes.push(value);
        value = value.wrapping_add(1);
    }
    bytes.truncate(total_length);
    bytes
}

/// Packs a contiguous packet stream into consecutive frames, setting each
/// frame's first-header pointer.
#[derive(Debug)]
pub struct PacketStream {
    builder: CaduBuilder,
    stream: Vec<u8>,
    starts: Vec<usize>,
}

impl PacketStream {
    pub fn new(builder: CaduBuilder) -> Self {
        Self { builder, stream: Vec::new(), starts: Vec::new() }
    }

    pub fn push(&mut self, packet: &[u8]) -> &mut Self {
        self.starts.push(self.stream.len());
        self.stream.extend_from_slice(packet);
        self
    }

    /// Pad with idle packets to a frame boundary and cut frames, numbering
    /// them from `first_count`.
    pub fn finish(mut self, first_count: u32) -> Vec<Frame> {
        let capacity = self.builder.zone_capacity();
        let used = self.stream.len() % capacity;
        if used != 0 {
            let mut remaining = capacity - used;
            if remaining < 7 {
                remaining += capacity;
            }
            let idle = packet_bytes(IDLE_APID, 0, remaining);
            self.push(&idle);
        }

        let mut frames = Vec::new();
        for (index, chunk) in self.stream.chunks(capacity).enumerate() {
            let zone_start = index * capacity;
            let zone_end = zone_start + chunk.len();
            let pointer = self
                .starts
                .iter()
                .find(|&&start| start >= zone_start && start < zone_end)
                .map_or(NO_PACKET_HEADER, |&start| (start - zone_start) as u16);
            frames.push(self.builder.frame(first_count + index as u32, pointer, chunk));
        }
        frames
    }
}
