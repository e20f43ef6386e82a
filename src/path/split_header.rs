//! Packet primary header spanning a frame boundary

use crate::types::{PRIMARY_HEADER_LENGTH, PacketLength};

/// Up to six bytes of a primary header carried from one frame to the next.
/// `index <= PRIMARY_HEADER_LENGTH` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitHeader {
    bytes: [u8; PRIMARY_HEADER_LENGTH],
    index: usize,
}

impl SplitHeader {
    /// Start from the tail of a zone (fewer than six bytes).
    pub fn from_fragment(fragment: &[u8]) -> Self {
        let mut header = Self::default();
        header.append(fragment);
        header
    }

    /// Append as many bytes as still fit; returns how many were taken.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let take = bytes.len().min(self.need());
        self.bytes[self.index..self.index + take].copy_from_slice(&bytes[..take]);
        self.index += take;
        take
    }

    /// Bytes still missing.
    pub fn need(&self) -> usize {
        PRIMARY_HEADER_LENGTH - self.index
    }

    pub fn held(&self) -> usize {
        self.index
    }

    pub fn is_complete(&self) -> bool {
        self.index == PRIMARY_HEADER_LENGTH
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.index]
    }

    /// Declared packet length, once all six bytes are present.
    pub fn packet_length(&self) -> Option<PacketLength> {
        if self.is_complete() { PacketLength::from_header(&self.bytes) } else { None }
    }
}
