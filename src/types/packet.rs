//! CCSDS space packet buffer and annotation

use serde::{Deserialize, Serialize};

use super::{FrameAnnotation, quality_flags};

/// Length of the CCSDS packet primary header.
pub const PRIMARY_HEADER_LENGTH: usize = 6;

/// Application ID reserved for idle packets.
pub const IDLE_APID: u16 = 0x7FF;

/// The packet data length field of a primary header.
///
/// The field stores "octets in the data field minus one", so every packet is
/// at least seven bytes long and no negative length can be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketLength(u16);

impl PacketLength {
    /// Smallest possible packet: a header plus one data byte.
    pub const MIN_TOTAL: usize = PRIMARY_HEADER_LENGTH + 1;
    pub const MAX_TOTAL: usize = PRIMARY_HEADER_LENGTH + 1 + u16::MAX as usize;

    pub fn from_field(field: u16) -> Self {
        Self(field)
    }

    /// Read bytes 4-5 of a primary header.
    pub fn from_header(header: &[u8]) -> Option<Self> {
        match header {
            [_, _, _, _, hi, lo, ..] => Some(Self(u16::from_be_bytes([*hi, *lo]))),
            _ => None,
        }
    }

    pub fn from_total(total: usize) -> Option<Self> {
        if (Self::MIN_TOTAL..=Self::MAX_TOTAL).contains(&total) {
            Some(Self((total - Self::MIN_TOTAL) as u16))
        } else {
            None
        }
    }

    pub fn field(self) -> u16 {
        self.0
    }

    /// Total packet size including the primary header.
    pub fn total(self) -> usize {
        self.0 as usize + Self::MIN_TOTAL
    }
}

/// Per-packet quality produced by reassembly and validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketAnnotation {
    pub invalid_length: bool,
    pub sequence_error: bool,
    pub has_fill: bool,
    /// Index of the first fill byte, or the packet length when complete.
    pub good_byte_count: usize,
}

impl PacketAnnotation {
    /// Single word: bit 17 invalid length, bit 16 fill, bits 15-0 good byte count.
    ///
    /// The count field is 16 bits wide, so counts above 65535 (packets can
    /// reach 65542 bytes) keep only their low 16 bits.
    pub fn to_word(&self) -> u32 {
        let mut word = self.good_byte_count as u32 & quality_flags::packet::GOOD_BYTE_COUNT_MASK;
        if self.has_fill {
            word |= quality_flags::packet::HAS_FILL;
        }
        if self.invalid_length {
            word |= quality_flags::packet::INVALID_LENGTH;
        }
        word
    }
}

/// A reusable CCSDS packet buffer.
///
/// Packets are pooled by the reassembler: [`Packet::reset`] keeps the
/// allocation. Receivers only ever see `&mut Packet` for the duration of one
/// delivery call, so no reference survives a reset.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    data: Vec<u8>,
    deleted: bool,
    pub frame_annotation: FrameAnnotation,
    pub annotation: PacketAnnotation,
}

impl Packet {
    pub fn new(length: PacketLength) -> Self {
        let mut packet = Self::default();
        packet.reset(length);
        packet
    }

    /// Build a complete packet from raw bytes. Returns `None` when the slice
    /// is shorter than a primary header plus one byte.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let length = PacketLength::from_total(bytes.len())?;
        let mut packet = Self::new(length);
        packet.data.copy_from_slice(bytes);
        packet.annotation.good_byte_count = bytes.len();
        Some(packet)
    }

    /// Prepare the buffer for a packet of `length`, zeroed, with cleared
    /// annotations.
    pub fn reset(&mut self, length: PacketLength) {
        self.data.clear();
        self.data.resize(length.total(), 0);
        self.deleted = false;
        self.frame_annotation = FrameAnnotation::default();
        self.annotation = PacketAnnotation::default();
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn delete(&mut self) {
        self.deleted = true;
    }

    pub fn version(&self) -> u8 {
        self.data.first().map_or(0, |b| b >> 5)
    }

    pub fn has_secondary_header(&self) -> bool {
        self.data.first().is_some_and(|b| b & 0x08 != 0)
    }

    pub fn application_id(&self) -> u16 {
        match self.data.as_slice() {
            [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]) & 0x07FF,
            _ => 0,
        }
    }

    pub fn sequence_flags(&self) -> u8 {
        self.data.get(2).map_or(0, |b| b >> 6)
    }

    pub fn sequence_count(&self) -> u16 {
        match self.data.as_slice() {
            [_, _, hi, lo, ..] => u16::from_be_bytes([*hi, *lo]) & 0x3FFF,
            _ => 0,
        }
    }

    /// Length declared by the primary header, including the header.
    pub fn declared_length(&self) -> Option<usize> {
        PacketLength::from_header(&self.data).map(PacketLength::total)
    }

    pub fn is_idle(&self) -> bool {
        self.application_id() == IDLE_APID
    }
}
