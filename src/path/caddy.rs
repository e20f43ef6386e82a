//! Fill cursor for a packet under construction

use crate::types::Packet;

/// Tracks how many bytes of a partially assembled packet are filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketCaddy {
    fill_index: usize,
}

impl PacketCaddy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill_index(&self) -> usize {
        self.fill_index
    }

    /// Bytes still needed to complete `packet`.
    pub fn need(&self, packet: &Packet) -> usize {
        packet.len().saturating_sub(self.fill_index)
    }

    /// Copy as much of `bytes` as the packet still needs; returns the count.
    pub fn fill(&mut self, packet: &mut Packet, bytes: &[u8]) -> usize {
        let take = bytes.len().min(self.need(packet));
        packet.bytes_mut()[self.fill_index..self.fill_index + take].copy_from_slice(&bytes[..take]);
        self.fill_index += take;
        take
    }

    pub fn is_complete(&self, packet: &Packet) -> bool {
        self.need(packet) == 0
    }

    /// Pad the rest of the packet with `fill_byte` and record where good data
    /// ends. Returns the number of fill bytes written.
    pub fn pad(&mut self, packet: &mut Packet, fill_byte: u8) -> usize {
        let padded = self.need(packet);
        packet.bytes_mut()[self.fill_index..].fill(fill_byte);
        packet.annotation.good_byte_count = self.fill_index;
        packet.annotation.has_fill = padded > 0;
        self.fill_index = packet.len();
        padded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PacketLength;

    #[test]
    fn fill_then_pad_marks_good_bytes() {
        let mut packet = Packet::new(PacketLength::from_field(4));
        let mut caddy = PacketCaddy::new();
        assert_eq!(caddy.fill(&mut packet, &[1, 2, 3, 4, 5, 6, 7, 8]), 8);
        assert_eq!(caddy.need(&packet), 3);

        assert_eq!(caddy.pad(&mut packet, 0xC9), 3);
        assert_eq!(&packet.bytes()[8..], &[0xC9; 3]);
        assert!(packet.annotation.has_fill);
        assert_eq!(packet.annotation.good_byte_count, 8);
        assert!(caddy.is_complete(&packet));
    }
}
