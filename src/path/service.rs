//! Packet reassembly state machine
//!
//! Frames arrive in transmission order. Each frame's data zone starts with
//! the first-header pointer (FHP), which either locates the first packet
//! header in the zone or carries one of two sentinels. Packets may span any
//! number of frames; a primary header may itself be split.
//!
//! The machine is an explicit [`State`]. Handling the leading bytes of a zone
//! is one transition function per state, each returning the next state and
//! an [`Effect`] describing discarded data. After that, the remainder of the
//! zone is cut into packets in the free state.
//!
//! Malformed telemetry never produces an error: every anomaly ends up in a
//! counter and in the frame's packet-decomposition quality bit.

use std::collections::HashMap;
use tracing::{debug, trace};

use super::caddy::PacketCaddy;
use super::list::PacketList;
use super::split_header::SplitHeader;
use super::zone::PacketZone;
use crate::config::PathConfig;
use crate::frame::{AnyView, FrameLayout, FrameView, IDLE_VCDU, NO_PACKET_HEADER};
use crate::routing::{FrameReceiver, PacketReceiver};
use crate::sequence::Sequencer;
use crate::types::{
    ComponentStatus, Frame, FrameAnnotation, IDLE_APID, PRIMARY_HEADER_LENGTH, Packet, PacketLength,
    StatusItem, StatusReporter,
};
use crate::Result;

/// Reassembly state carried between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Free,
    /// Part of a primary header is held
    SplitHeader(SplitHeader),
    /// A packet with a complete header is partly filled; the packet itself
    /// lives in the held slot of the packet list
    SplitPacket(PacketCaddy),
}

/// Classified first-header pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pointer {
    Idle,
    NoHeader,
    /// Points past the end of the zone
    Bad(u16),
    /// Absolute frame offset of the first packet header
    At(usize),
}

/// Side effects of one transition, applied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Effect {
    discarded_fragments: u64,
    discarded_bytes: u64,
    trouble: bool,
    idle_vcdu: bool,
    bad_pointer: bool,
    irrational: bool,
}

impl Effect {
    fn none() -> Self {
        Self::default()
    }

    /// One discarded fragment. Empty fragments are not counted.
    fn discard(mut self, bytes: usize) -> Self {
        if bytes > 0 {
            self.discarded_fragments += 1;
            self.discarded_bytes += bytes as u64;
        }
        self.trouble = true;
        self
    }

    fn idle(mut self) -> Self {
        self.idle_vcdu = true;
        self
    }

    fn bad_pointer(mut self) -> Self {
        self.bad_pointer = true;
        self
    }

    fn irrational(mut self) -> Self {
        self.irrational = true;
        self
    }

    fn trouble(mut self) -> Self {
        self.trouble = true;
        self
    }
}

/// Reassembly counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathStatus {
    pub frames: u64,
    pub packets: u64,
    pub idle_vcdus: u64,
    pub idle_packets: u64,
    pub discarded_fragments: u64,
    pub discarded_fragment_bytes: u64,
    pub irrational_packet_lengths: u64,
    pub bad_first_header_pointers: u64,
    /// Held fragments dropped because a frame sequence error broke the stream
    pub sequence_break_discards: u64,
    pub packet_sequence_errors: u64,
    pub missing_packets: u64,
    pub fill_packets: u64,
    pub dropped_fill_packets: u64,
    pub invalid_lengths: u64,
}

/// Per-packet checks applied when a packet is finished.
#[derive(Debug)]
struct PacketChecks {
    min_length: usize,
    max_length: usize,
    discard_idle: bool,
    keep_fill: bool,
    check_sequence: bool,
    sequencers: HashMap<u16, Sequencer>,
}

impl PacketChecks {
    /// Annotate `packet`; returns whether it should be delivered.
    fn finish(&mut self, packet: &mut Packet, status: &mut PathStatus) -> bool {
        if !packet.annotation.has_fill {
            packet.annotation.good_byte_count = packet.len();
        }

        let apid = packet.application_id();
        if apid == IDLE_APID {
            status.idle_packets += 1;
            if self.discard_idle {
                return false;
            }
        }

        if packet.len() < self.min_length || packet.len() > self.max_length {
            packet.annotation.invalid_length = true;
            status.invalid_lengths += 1;
        }

        if self.check_sequence && apid != IDLE_APID {
            let sequencer = self.sequencers.entry(apid).or_insert_with(Sequencer::for_packets);
            let before = sequencer.missing();
            if sequencer.check(packet.sequence_count() as u32).is_error() {
                packet.annotation.sequence_error = true;
                status.packet_sequence_errors += 1;
                status.missing_packets += sequencer.missing() - before;
            }
        }

        if packet.annotation.has_fill {
            status.fill_packets += 1;
            if !self.keep_fill {
                status.dropped_fill_packets += 1;
                return false;
            }
        }

        status.packets += 1;
        true
    }
}

/// Per-frame working values.
struct Cursor<'a> {
    bytes: &'a [u8],
    zone: PacketZone,
    annotation: FrameAnnotation,
}

/// CCSDS path service: frames in, packets out.
pub struct PathService<R: PacketReceiver = Box<dyn PacketReceiver>> {
    layout: FrameLayout,
    fill_byte: u8,
    max_rational_packet_size: usize,
    finalize_partial_on_flush: bool,
    state: State,
    packets: PacketList,
    checks: PacketChecks,
    status: PathStatus,
    output: R,
}

impl<R: PacketReceiver> PathService<R> {
    pub fn new(config: &PathConfig, layout: FrameLayout, output: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            layout,
            fill_byte: config.fill_byte,
            max_rational_packet_size: config.max_rational_packet_size,
            finalize_partial_on_flush: config.finalize_partial_on_flush,
            state: State::Free,
            packets: PacketList::new(),
            checks: PacketChecks {
                min_length: config.min_packet_length,
                max_length: config.max_packet_length,
                discard_idle: config.discard_idle_packets,
                keep_fill: config.keep_fill_packets,
                check_sequence: config.check_packet_sequence,
                sequencers: HashMap::new(),
            },
            status: PathStatus::default(),
            output,
        })
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn counters(&self) -> &PathStatus {
        &self.status
    }

    pub fn output(&self) -> &R {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut R {
        &mut self.output
    }

    /// Forget per-application sequence history.
    pub fn reset_sequences(&mut self) {
        self.checks.sequencers.clear();
    }

    fn classify(&self, pointer: u16) -> Pointer {
        match pointer {
            IDLE_VCDU => Pointer::Idle,
            NO_PACKET_HEADER => Pointer::NoHeader,
            offset => {
                let at = self.layout.data_start() + offset as usize;
                if at > self.layout.data_zone_end() { Pointer::Bad(offset) } else { Pointer::At(at) }
            }
        }
    }

    fn apply(&mut self, effect: Effect, annotation: &mut FrameAnnotation) {
        self.status.discarded_fragments += effect.discarded_fragments;
        self.status.discarded_fragment_bytes += effect.discarded_bytes;
        if effect.idle_vcdu {
            self.status.idle_vcdus += 1;
            annotation.set_idle_vcdu(true);
        }
        if effect.bad_pointer {
            self.status.bad_first_header_pointers += 1;
            annotation.set_bad_first_header_pointer(true);
        }
        if effect.irrational {
            self.status.irrational_packet_lengths += 1;
        }
        if effect.trouble {
            annotation.set_packet_decomposition_error(true);
        }
    }

    /// Drop whatever the previous frames left half-built.
    fn abandon(&mut self, state: State) -> Effect {
        match state {
            State::Free => Effect::none(),
            State::SplitHeader(header) => Effect::none().discard(header.held()),
            State::SplitPacket(caddy) => {
                self.packets.release();
                Effect::none().discard(caddy.fill_index())
            }
        }
    }

    /// Take the current slot as a finished packet.
    fn finish_current(&mut self) {
        let keep = match self.packets.current_mut() {
            Some(packet) => self.checks.finish(packet, &mut self.status),
            None => false,
        };
        if keep {
            self.packets.commit();
        } else {
            self.packets.release();
        }
    }

    /// Pad the held packet with fill and finish it.
    fn pad_and_finish(&mut self, mut caddy: PacketCaddy) {
        if let Some(packet) = self.packets.partial_mut() {
            let padded = caddy.pad(packet, self.fill_byte);
            trace!("Padded packet apid {} with {} fill bytes", packet.application_id(), padded);
        }
        self.finish_current();
    }

    fn on_free(&mut self, pointer: Pointer, cursor: &mut Cursor<'_>) -> (State, Effect) {
        match pointer {
            Pointer::Idle => {
                cursor.zone.move_remainder_to(cursor.bytes);
                (State::Free, Effect::none().idle())
            }
            Pointer::NoHeader => {
                let dropped = cursor.zone.move_remainder_to(cursor.bytes).len();
                (State::Free, Effect::none().discard(dropped))
            }
            Pointer::Bad(_) => {
                let dropped = cursor.zone.move_remainder_to(cursor.bytes).len();
                (State::Free, Effect::none().bad_pointer().discard(dropped))
            }
            Pointer::At(at) => {
                let skipped = cursor.zone.move_to(at);
                if skipped > 0 {
                    debug!("Discarding {} bytes ahead of the first header", skipped);
                    (State::Free, Effect::none().discard(skipped))
                } else {
                    (State::Free, Effect::none())
                }
            }
        }
    }

    fn on_split_header(
        &mut self,
        mut header: SplitHeader,
        pointer: Pointer,
        cursor: &mut Cursor<'_>,
    ) -> (State, Effect) {
        match pointer {
            Pointer::Idle => {
                cursor.zone.move_remainder_to(cursor.bytes);
                (State::Free, Effect::none().idle().discard(header.held()))
            }
            Pointer::Bad(_) => {
                let dropped = cursor.zone.move_remainder_to(cursor.bytes).len();
                (State::Free, Effect::none().bad_pointer().discard(header.held() + dropped))
            }
            Pointer::NoHeader => {
                header.append(cursor.zone.advance(cursor.bytes, header.need()));
                let Some(length) = header.packet_length() else {
                    // Zone shorter than the missing header bytes
                    return (State::SplitHeader(header), Effect::none());
                };
                if length.total() > self.max_rational_packet_size {
                    let dropped = cursor.zone.move_remainder_to(cursor.bytes).len();
                    return (State::Free, Effect::none().irrational().discard(PRIMARY_HEADER_LENGTH + dropped));
                }
                let caddy = self.start_packet(length, header.bytes(), cursor);
                let body = cursor.zone.move_remainder_to(cursor.bytes);
                self.continue_without_header(caddy, body)
            }
            Pointer::At(at) => {
                let offset = at - cursor.zone.index();
                let need = header.need();
                let length = (offset >= need)
                    .then(|| {
                        let mut completed = header;
                        completed.append(cursor.zone.peek(cursor.bytes, need));
                        completed.packet_length()
                    })
                    .flatten();
                match length {
                    Some(length) if length.total() - header.held() == offset => {
                        header.append(cursor.zone.advance(cursor.bytes, need));
                        let caddy = self.start_packet(length, header.bytes(), cursor);
                        let body = cursor.zone.advance(cursor.bytes, offset - need);
                        self.fill_partial(caddy, body);
                        self.finish_current();
                        (State::Free, Effect::none())
                    }
                    _ => {
                        let skipped = cursor.zone.move_to(at);
                        debug!("Split header does not line up with pointer {}; dropped", offset);
                        (State::Free, Effect::none().discard(header.held() + skipped))
                    }
                }
            }
        }
    }

    fn on_split_packet(&mut self, mut caddy: PacketCaddy, pointer: Pointer, cursor: &mut Cursor<'_>) -> (State, Effect) {
        let need = match self.packets.partial_mut() {
            Some(packet) => caddy.need(packet),
            None => return (State::Free, Effect::none().trouble()),
        };
        match pointer {
            Pointer::Idle => {
                self.pad_and_finish(caddy);
                cursor.zone.move_remainder_to(cursor.bytes);
                (State::Free, Effect::none().idle().trouble())
            }
            Pointer::Bad(_) => {
                self.pad_and_finish(caddy);
                let dropped = cursor.zone.move_remainder_to(cursor.bytes).len();
                (State::Free, Effect::none().bad_pointer().discard(dropped))
            }
            Pointer::NoHeader => {
                let body = cursor.zone.move_remainder_to(cursor.bytes);
                self.continue_without_header(caddy, body)
            }
            Pointer::At(at) => {
                let offset = at - cursor.zone.index();
                if offset == need {
                    let body = cursor.zone.advance(cursor.bytes, need);
                    self.fill_partial(caddy, body);
                    self.finish_current();
                    (State::Free, Effect::none())
                } else if offset < need {
                    let body = cursor.zone.advance(cursor.bytes, offset);
                    caddy = self.fill_partial(caddy, body);
                    self.pad_and_finish(caddy);
                    debug!("Packet cut short by next header: {} of {} bytes arrived", offset, need);
                    (State::Free, Effect::none().trouble())
                } else {
                    let body = cursor.zone.advance(cursor.bytes, need);
                    self.fill_partial(caddy, body);
                    self.finish_current();
                    let skipped = cursor.zone.move_to(at);
                    (State::Free, Effect::none().discard(skipped))
                }
            }
        }
    }

    /// A held packet continues in a zone with no header: it must end exactly
    /// at the zone end, or run on into the next frame.
    fn continue_without_header(&mut self, caddy: PacketCaddy, body: &[u8]) -> (State, Effect) {
        let need = match self.packets.partial_mut() {
            Some(packet) => caddy.need(packet),
            None => return (State::Free, Effect::none().trouble()),
        };
        let caddy = self.fill_partial(caddy, body);
        if body.len() < need {
            (State::SplitPacket(caddy), Effect::none())
        } else {
            self.finish_current();
            let extra = body.len() - need;
            if extra > 0 {
                debug!("Packet ended {} bytes before the end of a continuation zone", extra);
                (State::Free, Effect::none().discard(extra))
            } else {
                (State::Free, Effect::none())
            }
        }
    }

    /// Acquire a slot, stamp it with the frame annotation and copy the
    /// header; the slot is held as partial.
    fn start_packet(&mut self, length: PacketLength, header: &[u8], cursor: &Cursor<'_>) -> PacketCaddy {
        let packet = self.packets.acquire(length);
        packet.frame_annotation = cursor.annotation;
        let mut caddy = PacketCaddy::new();
        caddy.fill(packet, header);
        self.packets.hold();
        caddy
    }

    fn fill_partial(&mut self, mut caddy: PacketCaddy, bytes: &[u8]) -> PacketCaddy {
        if let Some(packet) = self.packets.partial_mut() {
            caddy.fill(packet, bytes);
        }
        caddy
    }

    /// Cut the rest of the zone into packets.
    fn decompose(&mut self, cursor: &mut Cursor<'_>) -> (State, Effect) {
        let mut effect = Effect::none();
        while !cursor.zone.is_empty() {
            if cursor.zone.remaining() < PRIMARY_HEADER_LENGTH {
                let fragment = cursor.zone.move_remainder_to(cursor.bytes);
                return (State::SplitHeader(SplitHeader::from_fragment(fragment)), effect);
            }

            let header = cursor.zone.peek(cursor.bytes, PRIMARY_HEADER_LENGTH);
            let Some(length) = PacketLength::from_header(header) else {
                break;
            };
            let total = length.total();
            if total > self.max_rational_packet_size {
                let dropped = cursor.zone.move_remainder_to(cursor.bytes).len();
                debug!("Irrational packet length {}; dropping {} bytes", total, dropped);
                effect = effect.irrational().discard(dropped);
                break;
            }

            let body = cursor.zone.advance(cursor.bytes, total);
            let caddy = self.start_packet(length, &[], cursor);
            let caddy = self.fill_partial(caddy, body);
            if body.len() < total {
                return (State::SplitPacket(caddy), effect);
            }
            self.finish_current();
        }
        (State::Free, effect)
    }

    fn deliver(&mut self, annotation: &FrameAnnotation) -> Result<()> {
        for packet in self.packets.touched_mut() {
            packet.frame_annotation.add_quality(annotation);
        }
        let result = if self.packets.completed_len() > 0 {
            trace!("Delivering {} packets", self.packets.completed_len());
            self.output.put_packets(self.packets.completed_mut())
        } else {
            Ok(())
        };
        self.packets.prune();
        result
    }
}

impl<R: PacketReceiver> FrameReceiver for PathService<R> {
    fn put_frame(&mut self, frame: &mut Frame) -> Result<()> {
        if frame.is_deleted() {
            return Ok(());
        }
        self.status.frames += 1;

        let mut annotation = frame.annotation;
        let bytes = frame.bytes();
        let pointer = self.classify(AnyView::new(&self.layout, &*frame).first_header_pointer());
        let mut cursor = Cursor {
            bytes,
            zone: PacketZone::new(self.layout.data_start(), self.layout.data_zone_end()),
            annotation,
        };

        let mut state = std::mem::replace(&mut self.state, State::Free);
        if annotation.has_sequence_error() && state != State::Free {
            let effect = self.abandon(state);
            self.status.sequence_break_discards += 1;
            debug!("Frame sequence break; dropped held fragment");
            self.apply(effect, &mut annotation);
            state = State::Free;
        }

        let (next, effect) = match state {
            State::Free => self.on_free(pointer, &mut cursor),
            State::SplitHeader(header) => self.on_split_header(header, pointer, &mut cursor),
            State::SplitPacket(caddy) => self.on_split_packet(caddy, pointer, &mut cursor),
        };
        self.apply(effect, &mut annotation);

        let (next, effect) = match next {
            State::Free => self.decompose(&mut cursor),
            held => (held, Effect::none()),
        };
        self.apply(effect, &mut annotation);
        self.state = next;

        frame.annotation = annotation;
        self.deliver(&annotation)
    }

    /// Finish a held packet with fill (or drop it), drop a held header
    /// fragment, then flush downstream. With nothing held this only flushes
    /// downstream.
    fn flush(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Free) {
            State::Free => {}
            State::SplitHeader(header) => {
                let effect = Effect::none().discard(header.held());
                self.status.discarded_fragments += effect.discarded_fragments;
                self.status.discarded_fragment_bytes += effect.discarded_bytes;
            }
            State::SplitPacket(caddy) => {
                if self.finalize_partial_on_flush {
                    self.pad_and_finish(caddy);
                    if self.packets.completed_len() > 0 {
                        self.output.put_packets(self.packets.completed_mut())?;
                    }
                    self.packets.prune();
                } else {
                    let effect = self.abandon(State::SplitPacket(caddy));
                    self.status.discarded_fragments += effect.discarded_fragments;
                    self.status.discarded_fragment_bytes += effect.discarded_bytes;
                }
            }
        }
        self.output.flush()
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        out.push(ComponentStatus::of(self));
        self.output.report_status(out);
    }
}

impl<R: PacketReceiver> StatusReporter for PathService<R> {
    fn status_name(&self) -> String {
        "path_service".to_string()
    }

    fn status(&self) -> Vec<StatusItem> {
        let s = &self.status;
        vec![
            StatusItem::new("frames", s.frames),
            StatusItem::new("packets", s.packets),
            StatusItem::new("idle_vcdus", s.idle_vcdus),
            StatusItem::new("idle_packets", s.idle_packets),
            StatusItem::new("discarded_fragments", s.discarded_fragments),
            StatusItem::new("discarded_fragment_bytes", s.discarded_fragment_bytes),
            StatusItem::new("irrational_packet_lengths", s.irrational_packet_lengths),
            StatusItem::new("bad_first_header_pointers", s.bad_first_header_pointers),
            StatusItem::new("sequence_break_discards", s.sequence_break_discards),
            StatusItem::new("packet_sequence_errors", s.packet_sequence_errors),
            StatusItem::new("missing_packets", s.missing_packets),
            StatusItem::new("fill_packets", s.fill_packets),
            StatusItem::new("dropped_fill_packets", s.dropped_fill_packets),
            StatusItem::new("invalid_lengths", s.invalid_lengths),
        ]
    }
}
