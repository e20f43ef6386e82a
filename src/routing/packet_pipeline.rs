//! Packet-level sequence and length validation

use std::collections::HashMap;
use tracing::debug;

use super::receiver::PacketReceiver;
use crate::sequence::Sequencer;
use crate::types::{ComponentStatus, IDLE_APID, Packet, PacketLength, StatusItem, StatusReporter};
use crate::{Result, TelemetryError};

/// Checks each packet's 14-bit sequence count per application ID and its
/// length against `[min, max]` and its own header, then forwards it.
///
/// Packets failing the length check are annotated and, when configured,
/// deleted so downstream receivers skip them.
pub struct PacketPipeline<R> {
    min_length: usize,
    max_length: usize,
    delete_invalid: bool,
    sequencers: HashMap<u16, Sequencer>,
    next: R,
    packets: u64,
    sequence_errors: u64,
    missing: u64,
    invalid_lengths: u64,
    deleted: u64,
}

impl<R: PacketReceiver> PacketPipeline<R> {
    pub fn new(min_length: usize, max_length: usize, delete_invalid: bool, next: R) -> Result<Self> {
        if min_length < PacketLength::MIN_TOTAL || min_length > max_length {
            return Err(TelemetryError::config_error(
                "packet pipeline",
                format!("invalid packet length range {}..={}", min_length, max_length),
            ));
        }
        Ok(Self {
            min_length,
            max_length,
            delete_invalid,
            sequencers: HashMap::new(),
            next,
            packets: 0,
            sequence_errors: 0,
            missing: 0,
            invalid_lengths: 0,
            deleted: 0,
        })
    }

    pub fn get_ref(&self) -> &R {
        &self.next
    }

    /// Forget per-application sequence history.
    pub fn reset(&mut self) {
        self.sequencers.clear();
    }
}

impl<R: PacketReceiver> PacketReceiver for PacketPipeline<R> {
    fn put_packet(&mut self, packet: &mut Packet) -> Result<()> {
        if packet.is_deleted() {
            return self.next.put_packet(packet);
        }
        self.packets += 1;

        let length = packet.len();
        let declared = packet.declared_length();
        if declared != Some(length) || length < self.min_length || length > self.max_length {
            packet.annotation.invalid_length = true;
            self.invalid_lengths += 1;
            debug!("Packet apid {} has invalid length {} (declared {:?})", packet.application_id(), length, declared);
        }

        let apid = packet.application_id();
        if apid != IDLE_APID {
            let sequencer = self.sequencers.entry(apid).or_insert_with(Sequencer::for_packets);
            let before = sequencer.missing();
            if sequencer.check(packet.sequence_count() as u32).is_error() {
                packet.annotation.sequence_error = true;
                self.sequence_errors += 1;
                self.missing += sequencer.missing() - before;
            }
        }

        if packet.annotation.invalid_length && self.delete_invalid {
            packet.delete();
            self.deleted += 1;
        }
        self.next.put_packet(packet)
    }

    fn flush(&mut self) -> Result<()> {
        self.next.flush()
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        out.push(ComponentStatus::of(self));
        self.next.report_status(out);
    }
}

impl<R> StatusReporter for PacketPipeline<R> {
    fn status_name(&self) -> String {
        "packet_pipeline".to_string()
    }

    fn status(&self) -> Vec<StatusItem> {
        vec![
            StatusItem::new("packets", self.packets),
            StatusItem::new("sequence_errors", self.sequence_errors),
            StatusItem::new("missing_packets", self.missing),
            StatusItem::new("invalid_lengths", self.invalid_lengths),
            StatusItem::new("deleted_packets", self.deleted),
        ]
    }
}
