//! Packets completed with fill

use crate::types::Packet;

/// A packet whose tail was padded with fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillEntry {
    pub sequence: u16,
    /// Dataset offset of the packet
    pub byte_offset: u64,
    /// Offset within the packet where fill begins
    pub fill_offset: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FillList {
    entries: Vec<FillEntry>,
    fill_bytes: u64,
}

impl FillList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `packet` if it carries fill. Returns whether it did.
    pub fn add(&mut self, packet: &Packet, byte_offset: u64) -> bool {
        if !packet.annotation.has_fill {
            return false;
        }
        let good = packet.annotation.good_byte_count.min(packet.len());
        self.entries.push(FillEntry {
            sequence: packet.sequence_count(),
            byte_offset,
            fill_offset: good as u32,
        });
        self.fill_bytes += (packet.len() - good) as u64;
        true
    }

    pub fn entries(&self) -> &[FillEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fill_bytes(&self) -> u64 {
        self.fill_bytes
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.fill_bytes = 0;
    }
}
