//! Application ID demultiplexer

use std::collections::BTreeMap;
use tracing::trace;

use super::receiver::{PacketBroadcaster, PacketReceiver};
use crate::types::{ComponentStatus, Packet, StatusItem, StatusReporter};
use crate::Result;

/// Routes packets by application ID, with the same fan-out and dead-letter
/// rules as [`VcRouter`](super::VcRouter).
#[derive(Default)]
pub struct PacketRouter {
    routes: BTreeMap<u16, PacketBroadcaster>,
    dead_letter: Option<Box<dyn PacketReceiver>>,
    routed: u64,
    unrouted: u64,
}

impl PacketRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, apid: u16, receiver: Box<dyn PacketReceiver>) {
        self.routes.entry(apid).or_default().add(receiver);
    }

    pub fn set_dead_letter(&mut self, receiver: Box<dyn PacketReceiver>) {
        self.dead_letter = Some(receiver);
    }

    pub fn apids(&self) -> impl Iterator<Item = u16> + '_ {
        self.routes.keys().copied()
    }
}

impl PacketReceiver for PacketRouter {
    fn put_packet(&mut self, packet: &mut Packet) -> Result<()> {
        if packet.is_deleted() {
            return Ok(());
        }
        let apid = packet.application_id();
        match self.routes.get_mut(&apid) {
            Some(route) => {
                self.routed += 1;
                route.put_packet(packet)
            }
            None => {
                self.unrouted += 1;
                trace!("No route for apid {}", apid);
                match self.dead_letter.as_mut() {
                    Some(dead_letter) => dead_letter.put_packet(packet),
                    None => Ok(()),
                }
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        for route in self.routes.values_mut() {
            route.flush()?;
        }
        if let Some(dead_letter) = self.dead_letter.as_mut() {
            dead_letter.flush()?;
        }
        Ok(())
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        out.push(ComponentStatus::of(self));
        for route in self.routes.values() {
            route.report_status(out);
        }
        if let Some(dead_letter) = &self.dead_letter {
            dead_letter.report_status(out);
        }
    }
}

impl StatusReporter for PacketRouter {
    fn status_name(&self) -> String {
        "packet_router".to_string()
    }

    fn status(&self) -> Vec<StatusItem> {
        vec![StatusItem::new("routed_packets", self.routed), StatusItem::new("unrouted_packets", self.unrouted)]
    }
}
