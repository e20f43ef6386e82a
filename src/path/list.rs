//! Pooled packet slots for one reassembler

use crate::types::{Packet, PacketLength};

/// Reusable packet buffers.
///
/// Slots `0..completed` hold packets finished in the current frame. When
/// `partial` is set, slot `completed` holds the packet still being filled.
/// Buffers are never freed, so steady-state reassembly does not allocate.
#[derive(Debug, Default)]
pub struct PacketList {
    packets: Vec<Packet>,
    completed: usize,
    partial: bool,
}

impl PacketList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the next free slot for a packet of `length` and return it. A
    /// held partial packet is dropped.
    pub fn acquire(&mut self, length: PacketLength) -> &mut Packet {
        self.partial = false;
        let slot = self.completed;
        if slot == self.packets.len() {
            self.packets.push(Packet::new(length));
        } else {
            self.packets[slot].reset(length);
        }
        &mut self.packets[slot]
    }

    /// The slot last returned by [`PacketList::acquire`].
    pub fn current_mut(&mut self) -> Option<&mut Packet> {
        self.packets.get_mut(self.completed)
    }

    /// Mark the current slot finished and ready for delivery.
    pub fn commit(&mut self) {
        self.partial = false;
        self.completed += 1;
    }

    /// Give the current slot back without delivering it.
    pub fn release(&mut self) {
        self.partial = false;
    }

    /// Keep the current slot as the packet continuing into the next frame.
    pub fn hold(&mut self) {
        self.partial = true;
    }

    pub fn partial_mut(&mut self) -> Option<&mut Packet> {
        if self.partial { self.packets.get_mut(self.completed) } else { None }
    }

    pub fn has_partial(&self) -> bool {
        self.partial
    }

    pub fn completed_len(&self) -> usize {
        self.completed
    }

    /// Packets finished since the last [`PacketList::prune`].
    pub fn completed_mut(&mut self) -> &mut [Packet] {
        &mut self.packets[..self.completed]
    }

    /// Finished packets plus the held partial, if any.
    pub fn touched_mut(&mut self) -> &mut [Packet] {
        let end = self.completed + usize::from(self.partial);
        &mut self.packets[..end]
    }

    /// Forget delivered packets and move a held partial packet to slot 0.
    pub fn prune(&mut self) {
        if self.partial && self.completed > 0 {
            self.packets.swap(0, self.completed);
        }
        self.completed = 0;
    }

    /// Number of pooled buffers.
    pub fn capacity(&self) -> usize {
        self.packets.len()
    }
}
