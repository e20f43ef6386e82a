//! Frame and packet receiver contracts

use crate::types::{ComponentStatus, Frame, Packet};
use crate::Result;

/// Consumer of frames.
///
/// Stages mutate the frame in place (annotation bits, the deleted flag) and
/// pass it on. A frame marked deleted must be ignored by later stages.
pub trait FrameReceiver: Send {
    fn put_frame(&mut self, frame: &mut Frame) -> Result<()>;

    /// Drain any held state and flush downstream.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Append the status of this stage and every stage behind it.
    fn report_status(&self, _out: &mut Vec<ComponentStatus>) {}
}

/// Consumer of packets.
///
/// Packets are borrowed for the duration of the call only; receivers copy
/// whatever they need to keep.
pub trait PacketReceiver: Send {
    fn put_packet(&mut self, packet: &mut Packet) -> Result<()>;

    fn put_packets(&mut self, packets: &mut [Packet]) -> Result<()> {
        for packet in packets.iter_mut() {
            self.put_packet(packet)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn report_status(&self, _out: &mut Vec<ComponentStatus>) {}
}

impl<R: FrameReceiver + ?Sized> FrameReceiver for Box<R> {
    fn put_frame(&mut self, frame: &mut Frame) -> Result<()> {
        (**self).put_frame(frame)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        (**self).report_status(out)
    }
}

impl<R: PacketReceiver + ?Sized> PacketReceiver for Box<R> {
    fn put_packet(&mut self, packet: &mut Packet) -> Result<()> {
        (**self).put_packet(packet)
    }

    fn put_packets(&mut self, packets: &mut [Packet]) -> Result<()> {
        (**self).put_packets(packets)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        (**self).report_status(out)
    }
}

/// Collects copies of every non-deleted frame.
impl FrameReceiver for Vec<Frame> {
    fn put_frame(&mut self, frame: &mut Frame) -> Result<()> {
        if !frame.is_deleted() {
            self.push(frame.clone());
        }
        Ok(())
    }
}

/// Collects copies of every non-deleted packet.
impl PacketReceiver for Vec<Packet> {
    fn put_packet(&mut self, packet: &mut Packet) -> Result<()> {
        if !packet.is_deleted() {
            self.push(packet.clone());
        }
        Ok(())
    }
}

/// Discards everything. Used as the end of chains that only count.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sink;

impl FrameReceiver for Sink {
    fn put_frame(&mut self, _frame: &mut Frame) -> Result<()> {
        Ok(())
    }
}

impl PacketReceiver for Sink {
    fn put_packet(&mut self, _packet: &mut Packet) -> Result<()> {
        Ok(())
    }
}

/// Fan-out to several frame receivers in registration order.
///
/// Delivery is all-or-nothing per frame: the first receiver error aborts
/// delivery to the remaining receivers and is returned.
#[derive(Default)]
pub struct FrameBroadcaster {
    receivers: Vec<Box<dyn FrameReceiver>>,
}

impl FrameBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, receiver: Box<dyn FrameReceiver>) {
        self.receivers.push(receiver);
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }
}

impl FrameReceiver for FrameBroadcaster {
    fn put_frame(&mut self, frame: &mut Frame) -> Result<()> {
        for receiver in &mut self.receivers {
            receiver.put_frame(frame)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for receiver in &mut self.receivers {
            receiver.flush()?;
        }
        Ok(())
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        for receiver in &self.receivers {
            receiver.report_status(out);
        }
    }
}

/// Fan-out to several packet receivers in registration order, with the same
/// abort-on-first-error rule as [`FrameBroadcaster`].
#[derive(Default)]
pub struct PacketBroadcaster {
    receivers: Vec<Box<dyn PacketReceiver>>,
}

impl PacketBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, receiver: Box<dyn PacketReceiver>) {
        self.receivers.push(receiver);
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }
}

impl PacketReceiver for PacketBroadcaster {
    fn put_packet(&mut self, packet: &mut Packet) -> Result<()> {
        for receiver in &mut self.receivers {
            receiver.put_packet(packet)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for receiver in &mut self.receivers {
            receiver.flush()?;
        }
        Ok(())
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        for receiver in &self.receivers {
            receiver.report_status(out);
        }
    }
}
