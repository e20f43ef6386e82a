//! Accumulated state of one application ID within a dataset

use super::fill_list::FillList;
use super::gap_list::GapList;
use super::kernel::{PacketKernel, TimeCode};
use super::wrong_length::WrongLengthList;
use crate::config::AppidConfig;
use crate::types::{CdsTime, Packet};
use crate::Result;

/// Per-application statistics for one session.
///
/// Created once from configuration, fed every accepted packet, and cleared
/// after its construction record block has been written.
#[derive(Debug, Clone)]
pub struct Appid {
    spacecraft: u16,
    id: u16,
    vcids: Vec<u8>,
    time_code: TimeCode,
    gaps: GapList,
    fills: FillList,
    wrong_lengths: WrongLengthList,
    first: Option<PacketKernel>,
    last: Option<PacketKernel>,
    first_esh: Option<CdsTime>,
    last_esh: Option<CdsTime>,
    first_byte: Option<u64>,
    rs_corrected: u32,
    packets: u32,
    bytes: u64,
}

impl Appid {
    pub fn new(spacecraft: u16, config: &AppidConfig) -> Result<Self> {
        Ok(Self {
            spacecraft,
            id: config.id,
            vcids: config.vcids.clone(),
            time_code: TimeCode::from_config(&config.time_code),
            gaps: GapList::new(config.sequence_step),
            fills: FillList::new(),
            wrong_lengths: WrongLengthList::new(&config.lengths)?,
            first: None,
            last: None,
            first_esh: None,
            last_esh: None,
            first_byte: None,
            rs_corrected: 0,
            packets: 0,
            bytes: 0,
        })
    }

    /// Kernel the packet would get at `byte_offset`.
    pub fn kernel(&self, packet: &Packet, byte_offset: u64) -> PacketKernel {
        PacketKernel::new(packet, &self.time_code, byte_offset)
    }

    /// Account for a packet written at `kernel.byte_offset`.
    pub fn accept(&mut self, packet: &Packet, kernel: PacketKernel) {
        self.gaps.check(&kernel);
        self.fills.add(packet, kernel.byte_offset);
        self.wrong_lengths.check(packet);
        if packet.frame_annotation.is_rs_corrected() {
            self.rs_corrected += 1;
        }

        if self.first.is_none_or(|first| kernel.packet_time < first.packet_time) {
            self.first = Some(kernel);
        }
        if self.last.is_none_or(|last| kernel.packet_time >= last.packet_time) {
            self.last = Some(kernel);
        }
        self.first_esh = Some(self.first_esh.map_or(kernel.esh_time, |t| t.min(kernel.esh_time)));
        self.last_esh = Some(self.last_esh.map_or(kernel.esh_time, |t| t.max(kernel.esh_time)));
        self.first_byte.get_or_insert(kernel.byte_offset);
        self.packets += 1;
        self.bytes += packet.len() as u64;
    }

    pub fn spacecraft(&self) -> u16 {
        self.spacecraft
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn vcids(&self) -> &[u8] {
        &self.vcids
    }

    pub fn gaps(&self) -> &GapList {
        &self.gaps
    }

    pub fn fills(&self) -> &FillList {
        &self.fills
    }

    pub fn wrong_lengths(&self) -> &WrongLengthList {
        &self.wrong_lengths
    }

    /// Earliest packet by packet time.
    pub fn first(&self) -> Option<&PacketKernel> {
        self.first.as_ref()
    }

    /// Latest packet by packet time.
    pub fn last(&self) -> Option<&PacketKernel> {
        self.last.as_ref()
    }

    pub fn first_esh(&self) -> Option<CdsTime> {
        self.first_esh
    }

    pub fn last_esh(&self) -> Option<CdsTime> {
        self.last_esh
    }

    pub fn first_byte(&self) -> Option<u64> {
        self.first_byte
    }

    pub fn rs_corrected(&self) -> u32 {
        self.rs_corrected
    }

    pub fn packets(&self) -> u32 {
        self.packets
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn has_data(&self) -> bool {
        self.packets > 0
    }

    /// Start a new session with the same configuration.
    pub fn clear(&mut self) {
        self.gaps.clear();
        self.fills.clear();
        self.wrong_lengths.clear();
        self.first = None;
        self.last = None;
        self.first_esh = None;
        self.last_esh = None;
        self.first_byte = None;
        self.rs_corrected = 0;
        self.packets = 0;
        self.bytes = 0;
    }
}
