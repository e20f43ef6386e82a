//! Shared builders for integration tests

#![allow(dead_code)]

use downlink::config::{
    AppidConfig, ChannelConfig, ChannelService, DatasetConfig, DownlinkConfig, FrameLayoutConfig, OutputConfig,
};
use downlink::frame::{ATTACHED_SYNC_MARKER, FrameLayout, NO_PACKET_HEADER, crc16_ccitt};
use downlink::{CdsTime, Frame, FrameAnnotation};
use std::path::PathBuf;

pub const SPACECRAFT: u16 = 42;
pub const SCIENCE_VC: u8 = 16;
pub const HOUSEKEEPING_VC: u8 = 5;

/// A scratch directory under the system temp dir, removed on drop.
pub struct Scratch(pub PathBuf);

impl Scratch {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("downlink-it-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).expect("create scratch directory");
        Self(path)
    }

    pub fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.0)
            .expect("read scratch directory")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

pub fn layout_config() -> FrameLayoutConfig {
    FrameLayoutConfig { frame_length: 128, has_crc: true, rs_parity_length: 0, ..FrameLayoutConfig::default() }
}

pub fn appid(id: u16, vcid: u8) -> AppidConfig {
    AppidConfig { id, vcids: vec![vcid], sequence_step: 1, time_code: Default::default(), lengths: Default::default() }
}

/// Two path channels; one dataset reading apid 64 (science) and apid 3
/// (housekeeping).
pub fn config(directory: &std::path::Path) -> DownlinkConfig {
    let mut config = DownlinkConfig {
        frame: layout_config(),
        channels: vec![
            ChannelConfig {
                spacecraft: SPACECRAFT,
                virtual_channel: SCIENCE_VC,
                service: ChannelService::Path,
                check_sequence: true,
            },
            ChannelConfig {
                spacecraft: SPACECRAFT,
                virtual_channel: HOUSEKEEPING_VC,
                service: ChannelService::Path,
                check_sequence: true,
            },
        ],
        datasets: vec![DatasetConfig {
            name: "terra".into(),
            spacecraft: SPACECRAFT,
            kind: Default::default(),
            is_test: false,
            quicklook: false,
            appids: vec![appid(64, SCIENCE_VC), appid(3, HOUSEKEEPING_VC)],
        }],
        output: OutputConfig { directory: directory.to_path_buf(), ..OutputConfig::default() },
        ..DownlinkConfig::default()
    };
    config.quality.check_crc = true;
    config
}

pub fn packet(apid: u16, sequence: u16, total_length: usize, time: CdsTime) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(total_length);
    bytes.push(0x08 | ((apid >> 8) as u8 & 0x07));
    bytes.push(apid as u8);
    bytes.push(0xC0 | ((sequence >> 8) as u8 & 0x3F));
    bytes.push(sequence as u8);
    bytes.extend_from_slice(&((total_length - 7) as u16).to_be_bytes());
    bytes.extend_from_slice(&time.0.to_be_bytes());
    let mut value = apid as u8 ^ sequence as u8;
    while bytes.len() < total_length {
        bytes.push(value);
        value = value.wrapping_add(3);
    }
    bytes.truncate(total_length);
    bytes
}

pub fn idle_packet(total_length: usize) -> Vec<u8> {
    let mut bytes = vec![0x07, 0xFF, 0xC0, 0x00];
    bytes.extend_from_slice(&((total_length - 7) as u16).to_be_bytes());
    bytes.resize(total_length, 0);
    bytes
}

/// Cuts a packet stream into frames of one virtual channel.
pub struct Downlinker {
    layout: FrameLayout,
    virtual_channel: u8,
    count: u32,
    stream: Vec<u8>,
    starts: Vec<usize>,
}

impl Downlinker {
    pub fn new(virtual_channel: u8) -> Self {
        let layout = FrameLayout::new(&layout_config()).expect("valid layout");
        Self { layout, virtual_channel, count: 0, stream: Vec::new(), starts: Vec::new() }
    }

    pub fn capacity(&self) -> usize {
        self.layout.data_zone_end() + 1 - self.layout.data_start()
    }

    pub fn push(&mut self, packet: &[u8]) -> &mut Self {
        self.starts.push(self.stream.len());
        self.stream.extend_from_slice(packet);
        self
    }

    /// Skip `n` frame counts, as if frames were lost on the link.
    pub fn skip(&mut self, n: u32) {
        self.count += n;
    }

    /// Emit all pushed packets, padding the last frame with an idle packet.
    pub fn frames(&mut self) -> Vec<Frame> {
        let capacity = self.capacity();
        let used = self.stream.len() % capacity;
        if used != 0 {
            let mut remaining = capacity - used;
            if remaining < 7 {
                remaining += capacity;
            }
            let idle = idle_packet(remaining);
            self.push(&idle);
        }

        let stream = std::mem::take(&mut self.stream);
        let starts = std::mem::take(&mut self.starts);
        let mut frames = Vec::new();
        for (index, chunk) in stream.chunks(capacity).enumerate() {
            let zone_start = index * capacity;
            let pointer = starts
                .iter()
                .find(|&&start| start >= zone_start && start < zone_start + chunk.len())
                .map_or(NO_PACKET_HEADER, |&start| (start - zone_start) as u16);
            frames.push(self.frame(pointer, chunk));
        }
        frames
    }

    fn frame(&mut self, pointer: u16, data: &[u8]) -> Frame {
        let count = self.count;
        self.count += 1;

        let mut bytes = vec![0u8; self.layout.frame_length()];
        let header_start = self.layout.header_start();
        bytes[..header_start].copy_from_slice(&ATTACHED_SYNC_MARKER[..header_start]);
        let scid = SPACECRAFT & 0xFF;
        bytes[header_start..header_start + 6].copy_from_slice(&[
            0x40 | (scid >> 2) as u8,
            ((scid & 0x3) as u8) << 6 | (self.virtual_channel & 0x3F),
            (count >> 16) as u8,
            (count >> 8) as u8,
            count as u8,
            0,
        ]);
        let pointer_at = self.layout.data_zone_start();
        bytes[pointer_at..pointer_at + 2].copy_from_slice(&pointer.to_be_bytes());
        let start = self.layout.data_start();
        bytes[start..start + data.len()].copy_from_slice(data);
        if let Some(coverage) = self.layout.crc_coverage() {
            let crc = crc16_ccitt(&bytes[coverage.clone()]);
            bytes[coverage.end..coverage.end + 2].copy_from_slice(&crc.to_be_bytes());
        }

        let mut annotation = FrameAnnotation::new(1_706_793_255_000 + count as i64);
        annotation.set_locked(true);
        Frame::new(bytes, annotation)
    }
}

/// Packet time `seconds` after 2024-02-01 00:00:00 UTC.
pub fn time(seconds: u32) -> CdsTime {
    CdsTime::from_parts(24_137, seconds * 1000, 0)
}

