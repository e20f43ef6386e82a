//! Cursor over the packet zone of one frame

/// Cursor over `[index, zone_end]` of a frame's bytes. Indices are absolute
/// offsets into the frame.
///
/// `remaining() == zone_end - index + 1` holds after every mutation;
/// [`PacketZone::move_to`], [`PacketZone::move_remainder_to`] and
/// [`PacketZone::advance`] are the only mutators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketZone {
    index: usize,
    /// One past the last zone byte
    end: usize,
}

impl PacketZone {
    /// Zone covering `start..=zone_end`.
    pub fn new(start: usize, zone_end: usize) -> Self {
        let end = zone_end + 1;
        Self { index: start.min(end), end }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Inclusive last byte of the zone.
    pub fn zone_end(&self) -> usize {
        self.end - 1
    }

    pub fn remaining(&self) -> usize {
        self.end - self.index
    }

    pub fn is_empty(&self) -> bool {
        self.index == self.end
    }

    /// Jump to absolute offset `index`; returns the number of bytes skipped.
    /// Offsets past the zone clamp to its end.
    pub fn move_to(&mut self, index: usize) -> usize {
        let target = index.clamp(self.index, self.end);
        let skipped = target - self.index;
        self.index = target;
        skipped
    }

    /// Take the next `count` bytes (fewer if the zone runs out).
    pub fn advance<'a>(&mut self, bytes: &'a [u8], count: usize) -> &'a [u8] {
        let take = count.min(self.remaining());
        let start = self.index;
        self.index += take;
        bytes.get(start..start + take).unwrap_or(&[])
    }

    /// Take everything left, leaving the zone empty.
    pub fn move_remainder_to<'a>(&mut self, bytes: &'a [u8]) -> &'a [u8] {
        self.advance(bytes, self.remaining())
    }

    /// Look at the next `count` bytes without consuming them.
    pub fn peek<'a>(&self, bytes: &'a [u8], count: usize) -> &'a [u8] {
        let take = count.min(self.remaining());
        bytes.get(self.index..self.index + take).unwrap_or(&[])
    }
}
