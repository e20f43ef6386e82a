use proptest::prelude::*;

use super::*;
use crate::config::{FrameLayoutConfig, PathConfig};
use crate::frame::{FrameLayout, IDLE_VCDU, NO_PACKET_HEADER};
use crate::routing::FrameReceiver;
use crate::test_utils::{CaduBuilder, PacketStream, packet_bytes};
use crate::types::{Frame, Packet, StatusReporter};

/// 52-byte data zones keep hand-built frames readable.
fn small_layout() -> FrameLayout {
    FrameLayout::new(&FrameLayoutConfig { frame_length: 64, rs_parity_length: 0, ..FrameLayoutConfig::default() })
        .unwrap()
}

fn service() -> (PathService<Vec<Packet>>, CaduBuilder) {
    let layout = small_layout();
    let builder = CaduBuilder::new(&layout, 42, 1);
    let service = PathService::new(&PathConfig::default(), layout, Vec::new()).unwrap();
    (service, builder)
}

fn run(service: &mut PathService<Vec<Packet>>, frames: Vec<Frame>) -> Vec<Frame> {
    frames
        .into_iter()
        .map(|mut frame| {
            service.put_frame(&mut frame).unwrap();
            frame
        })
        .collect()
}

#[test]
fn single_frame_packets_round_trip() {
    let (mut service, builder) = service();
    let packets = [packet_bytes(100, 0, 10), packet_bytes(100, 1, 20), packet_bytes(101, 7, 15)];
    let mut zone = Vec::new();
    for packet in &packets {
        zone.extend_from_slice(packet);
    }
    zone.extend_from_slice(&packet_bytes(0x7FF, 0, 52 - zone.len()));

    let frames = run(&mut service, vec![builder.frame(0, 0, &zone)]);

    let out = service.output();
    assert_eq!(out.len(), 3);
    for (emitted, expected) in out.iter().zip(&packets) {
        assert_eq!(emitted.bytes(), expected.as_slice());
        assert!(!emitted.annotation.has_fill);
        assert_eq!(emitted.annotation.good_byte_count, expected.len());
    }
    assert_eq!(service.counters().idle_packets, 1);
    assert!(!frames[0].annotation.has_packet_decomposition_error());
    assert_eq!(service.state(), &State::Free);
}

#[test]
fn packet_spanning_three_frames() {
    let (mut service, builder) = service();
    let big = packet_bytes(200, 3, 130);
    let mut stream = PacketStream::new(builder);
    stream.push(&big);
    let frames = stream.finish(0);
    assert_eq!(frames.len(), 3);

    let frames = run(&mut service, frames);
    assert_eq!(service.output().len(), 1);
    assert_eq!(service.output()[0].bytes(), big.as_slice());
    assert!(frames.iter().all(|f| !f.annotation.has_packet_decomposition_error()));
}

#[test]
fn idle_vcdu_is_transparent() {
    let (mut service, builder) = service();
    let frames = run(&mut service, vec![builder.idle_frame(0)]);

    assert!(service.output().is_empty());
    assert!(!frames[0].annotation.has_packet_decomposition_error());
    assert!(frames[0].annotation.is_idle_vcdu());
    let counters = *service.counters();
    assert_eq!(counters.idle_vcdus, 1);
    assert_eq!(counters, PathStatus { frames: 1, idle_vcdus: 1, ..PathStatus::default() });
}

#[test]
fn irrational_length_drops_rest_of_zone_and_recovers() {
    let (mut service, builder) = service();
    let mut zone = packet_bytes(100, 0, 10);
    // Header claiming 0xFFFF + 7 bytes
    zone.extend_from_slice(&[0x00, 0x64, 0xC0, 0x01, 0xFF, 0xFF]);
    zone.extend_from_slice(&packet_bytes(100, 2, 10));
    let corrupt = builder.frame(0, 0, &zone);

    let mut next = packet_bytes(100, 3, 12);
    next.extend_from_slice(&packet_bytes(0x7FF, 0, 40));
    let clean = builder.frame(1, 0, &next);

    let frames = run(&mut service, vec![corrupt, clean]);
    let counts: Vec<u16> = service.output().iter().map(|p| p.sequence_count()).collect();
    assert_eq!(counts, vec![0, 3]);
    assert_eq!(service.counters().irrational_packet_lengths, 1);
    assert_eq!(service.counters().discarded_fragment_bytes, 42);
    assert!(frames[0].annotation.has_packet_decomposition_error());
    assert!(!frames[1].annotation.has_packet_decomposition_error());
}

#[test]
fn leading_fragment_in_free_state_is_discarded() {
    let (mut service, builder) = service();
    let mut zone = vec![0xEE; 5];
    zone.extend_from_slice(&packet_bytes(300, 0, 47));
    let frames = run(&mut service, vec![builder.frame(0, 5, &zone)]);

    assert_eq!(service.output().len(), 1);
    assert_eq!(service.counters().discarded_fragments, 1);
    assert_eq!(service.counters().discarded_fragment_bytes, 5);
    assert!(frames[0].annotation.has_packet_decomposition_error());
}

#[test]
fn bad_first_header_pointer_drops_zone() {
    let (mut service, builder) = service();
    let frames = run(&mut service, vec![builder.frame(0, 60, &[0u8; 52])]);
    assert!(service.output().is_empty());
    assert_eq!(service.counters().bad_first_header_pointers, 1);
    assert!(frames[0].annotation.has_bad_first_header_pointer());
    assert!(frames[0].annotation.has_packet_decomposition_error());
}

#[test]
fn short_packet_is_padded_when_next_header_arrives_early() {
    let (mut service, builder) = service();
    // 40 of 60 bytes arrive, then the next frame starts a new packet at once
    let long = packet_bytes(400, 0, 60);
    let mut first = packet_bytes(0x7FF, 0, 12);
    first.extend_from_slice(&long[..40]);

    let mut second = packet_bytes(400, 1, 20);
    second.extend_from_slice(&packet_bytes(0x7FF, 0, 32));

    let frames = run(&mut service, vec![builder.frame(0, 0, &first), builder.frame(1, 0, &second)]);

    let out = service.output();
    assert_eq!(out.len(), 2);
    assert!(out[0].annotation.has_fill);
    assert_eq!(out[0].annotation.good_byte_count, 40);
    assert_eq!(&out[0].bytes()[..40], &long[..40]);
    assert!(out[0].bytes()[40..].iter().all(|&b| b == 0xC9));
    assert!(!out[1].annotation.has_fill);
    assert_eq!(service.counters().fill_packets, 1);
    assert!(frames[1].annotation.has_packet_decomposition_error());
    assert!(out[0].frame_annotation.has_packet_decomposition_error());
}

#[test]
fn continuation_without_header_longer_than_packet_discards_rest() {
    let (mut service, builder) = service();
    let packet = packet_bytes(500, 0, 30);
    let mut first = packet_bytes(0x7FF, 0, 42);
    first.extend_from_slice(&packet[..10]);
    // Claims no header but the packet ends 32 bytes early
    let mut second = packet[10..].to_vec();
    second.resize(52, 0xAA);

    run(&mut service, vec![builder.frame(0, 0, &first), builder.frame(1, NO_PACKET_HEADER, &second)]);
    assert_eq!(service.output().len(), 1);
    assert_eq!(service.output()[0].bytes(), packet.as_slice());
    assert_eq!(service.counters().discarded_fragment_bytes, 32);
}

#[test]
fn frame_sequence_break_drops_held_packet() {
    let (mut service, builder) = service();
    let packet = packet_bytes(600, 0, 80);
    let mut stream = PacketStream::new(builder.clone());
    stream.push(&packet);
    let mut frames = stream.finish(0);
    frames[1].annotation.set_sequence_error(true);

    let frames = run(&mut service, frames);
    assert!(service.output().iter().all(|p| p.application_id() != 600));
    assert_eq!(service.counters().sequence_break_discards, 1);
    assert!(frames[1].annotation.has_packet_decomposition_error());
}

#[test]
fn idle_vcdu_aborts_held_packet_with_fill() {
    let (mut service, builder) = service();
    let packet = packet_bytes(700, 0, 80);
    let mut first = packet_bytes(0x7FF, 0, 12);
    first.extend_from_slice(&packet[..40]);

    run(&mut service, vec![builder.frame(0, 0, &first), builder.frame(1, IDLE_VCDU, &[])]);
    let out = service.output();
    assert_eq!(out.len(), 1);
    assert!(out[0].annotation.has_fill);
    assert_eq!(out[0].annotation.good_byte_count, 40);
    assert_eq!(service.counters().idle_vcdus, 1);
}

#[test]
fn flush_finalizes_partial_then_is_idempotent() {
    let (mut service, builder) = service();
    let packet = packet_bytes(800, 0, 80);
    let mut first = packet_bytes(0x7FF, 0, 12);
    first.extend_from_slice(&packet[..40]);
    run(&mut service, vec![builder.frame(0, 0, &first)]);
    assert!(service.output().is_empty());

    service.flush().unwrap();
    assert_eq!(service.output().len(), 1);
    assert_eq!(service.output()[0].annotation.good_byte_count, 40);

    let before = *service.counters();
    let status_before = service.status();
    service.flush().unwrap();
    service.flush().unwrap();
    assert_eq!(service.output().len(), 1);
    assert_eq!(*service.counters(), before);
    assert_eq!(service.status(), status_before);
}

#[test]
fn flush_can_discard_partial_instead() {
    let layout = small_layout();
    let builder = CaduBuilder::new(&layout, 42, 1);
    let config = PathConfig { finalize_partial_on_flush: false, ..PathConfig::default() };
    let mut service = PathService::new(&config, layout, Vec::<Packet>::new()).unwrap();

    let mut first = packet_bytes(0x7FF, 0, 12);
    first.extend_from_slice(&packet_bytes(800, 0, 80)[..40]);
    run(&mut service, vec![builder.frame(0, 0, &first)]);
    service.flush().unwrap();
    assert!(service.output().is_empty());
    assert_eq!(service.counters().discarded_fragment_bytes, 40);
}

/// Frame 0 ends with the first three bytes of `header`, leaving it held.
fn hold_split_header(service: &mut PathService<Vec<Packet>>, builder: &CaduBuilder, header: &[u8]) {
    let mut zone = packet_bytes(5, 0, 49);
    zone.extend_from_slice(&header[..3]);
    let frames = run(service, vec![builder.frame(0, 0, &zone)]);
    assert!(matches!(service.state(), State::SplitHeader(held) if held.held() == 3));
    assert_eq!(service.counters().discarded_fragments, 0);
    assert!(!frames[0].annotation.has_packet_decomposition_error());
}

#[test]
fn idle_vcdu_discards_held_header() {
    let (mut service, builder) = service();
    hold_split_header(&mut service, &builder, &packet_bytes(300, 0, 20));

    let frames = run(&mut service, vec![builder.idle_frame(1)]);
    assert_eq!(service.state(), &State::Free);
    assert_eq!(service.counters().discarded_fragments, 1);
    assert_eq!(service.counters().discarded_fragment_bytes, 3);
    assert_eq!(service.counters().idle_vcdus, 1);
    assert!(frames[0].annotation.is_idle_vcdu());
    assert!(frames[0].annotation.has_packet_decomposition_error());
    assert!(service.output().iter().all(|p| p.application_id() != 300));
}

#[test]
fn bad_pointer_discards_held_header_and_zone() {
    let (mut service, builder) = service();
    hold_split_header(&mut service, &builder, &packet_bytes(300, 0, 20));

    let frames = run(&mut service, vec![builder.frame(1, 60, &[0u8; 52])]);
    assert_eq!(service.state(), &State::Free);
    assert_eq!(service.counters().discarded_fragments, 1);
    assert_eq!(service.counters().discarded_fragment_bytes, 55);
    assert_eq!(service.counters().bad_first_header_pointers, 1);
    assert!(frames[0].annotation.has_bad_first_header_pointer());
    assert!(frames[0].annotation.has_packet_decomposition_error());
}

#[test]
fn pointer_mismatch_discards_held_header() {
    let (mut service, builder) = service();
    let split = packet_bytes(300, 0, 20);
    hold_split_header(&mut service, &builder, &split);

    // The completed header wants 17 more bytes but the next packet starts at 10
    let mut zone = split[3..13].to_vec();
    zone.extend_from_slice(&packet_bytes(301, 0, 42));
    let frames = run(&mut service, vec![builder.frame(1, 10, &zone)]);

    assert_eq!(service.state(), &State::Free);
    assert_eq!(service.counters().discarded_fragments, 1);
    assert_eq!(service.counters().discarded_fragment_bytes, 13);
    assert!(frames[0].annotation.has_packet_decomposition_error());
    let apids: Vec<u16> = service.output().iter().map(|p| p.application_id()).collect();
    assert_eq!(apids, vec![5, 301]);
}

#[test]
fn header_completed_without_pointer_can_be_irrational() {
    let (mut service, builder) = service();
    // Declares 0xFFFF + 7 bytes
    let header = [0x00, 0x64, 0xC0, 0x01, 0xFF, 0xFF];
    hold_split_header(&mut service, &builder, &header);

    let mut zone = header[3..].to_vec();
    zone.resize(52, 0xAA);
    let frames = run(&mut service, vec![builder.frame(1, NO_PACKET_HEADER, &zone)]);

    assert_eq!(service.state(), &State::Free);
    assert_eq!(service.counters().irrational_packet_lengths, 1);
    assert_eq!(service.counters().discarded_fragments, 1);
    assert_eq!(service.counters().discarded_fragment_bytes, 55);
    assert!(frames[0].annotation.has_packet_decomposition_error());
    assert_eq!(service.output().len(), 1);
}

#[test]
fn header_completed_without_pointer_continues_packet() {
    let (mut service, builder) = service();
    let packet = packet_bytes(300, 0, 60);
    hold_split_header(&mut service, &builder, &packet);

    let frames = run(&mut service, vec![builder.frame(1, NO_PACKET_HEADER, &packet[3..55])]);
    assert!(matches!(service.state(), State::SplitPacket(_)));
    assert!(!frames[0].annotation.has_packet_decomposition_error());

    let mut zone = packet[55..].to_vec();
    zone.extend_from_slice(&packet_bytes(5, 1, 47));
    let frames = run(&mut service, vec![builder.frame(2, 5, &zone)]);

    assert_eq!(service.state(), &State::Free);
    assert!(!frames[0].annotation.has_packet_decomposition_error());
    let out: Vec<&Packet> = service.output().iter().filter(|p| p.application_id() == 300).collect();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].bytes(), packet.as_slice());
    assert_eq!(service.counters().discarded_fragments, 0);
}

#[test]
fn packet_sequence_gap_is_annotated() {
    let (mut service, builder) = service();
    let mut stream = PacketStream::new(builder);
    for count in [0, 1, 3, 4] {
        stream.push(&packet_bytes(900, count, 20));
    }
    run(&mut service, stream.finish(0));

    let flags: Vec<bool> = service.output().iter().map(|p| p.annotation.sequence_error).collect();
    assert_eq!(flags, vec![false, false, true, false]);
    assert_eq!(service.counters().packet_sequence_errors, 1);
    assert_eq!(service.counters().missing_packets, 1);
}

#[test]
fn invalid_configuration_fails_fast() {
    let config = PathConfig { min_packet_length: 100, max_packet_length: 10, ..PathConfig::default() };
    assert!(PathService::new(&config, small_layout(), Vec::<Packet>::new()).is_err());
}

#[test]
fn length_limits_flag_packets() {
    let layout = small_layout();
    let builder = CaduBuilder::new(&layout, 42, 1);
    let config = PathConfig { min_packet_length: 12, max_packet_length: 30, ..PathConfig::default() };
    let mut service = PathService::new(&config, layout, Vec::<Packet>::new()).unwrap();

    let mut stream = PacketStream::new(builder);
    stream.push(&packet_bytes(10, 0, 8)).push(&packet_bytes(10, 1, 20)).push(&packet_bytes(10, 2, 40));
    run(&mut service, stream.finish(0));

    let invalid: Vec<bool> = service.output().iter().map(|p| p.annotation.invalid_length).collect();
    assert_eq!(invalid, vec![true, false, true]);
}

proptest! {
    #[test]
    fn prop_split_point_does_not_change_packet(split in 1usize..30) {
        let (mut service, builder) = service();
        let packet = packet_bytes(123, 9, 30);

        let mut stream = PacketStream::new(builder);
        stream.push(&packet_bytes(5, 0, 52 - split)).push(&packet);
        let frames = stream.finish(0);
        run(&mut service, frames);

        let out: Vec<&Packet> = service.output().iter().filter(|p| p.application_id() == 123).collect();
        prop_assert_eq!(out.len(), 1);
        prop_assert_eq!(out[0].bytes(), packet.as_slice());
        prop_assert_eq!(out[0].annotation.good_byte_count, 30);
        prop_assert!(!out[0].annotation.has_fill);
        prop_assert_eq!(service.counters().discarded_fragments, 0);
    }

    #[test]
    fn prop_stream_of_packets_survives_framing(lengths in prop::collection::vec(7usize..120, 1..25)) {
        let (mut service, builder) = service();
        let packets: Vec<Vec<u8>> = lengths
            .iter()
            .enumerate()
            .map(|(i, &len)| packet_bytes(77, i as u16, len))
            .collect();
        let mut stream = PacketStream::new(builder);
        for packet in &packets {
            stream.push(packet);
        }
        run(&mut service, stream.finish(0));

        prop_assert_eq!(service.output().len(), packets.len());
        for (emitted, expected) in service.output().iter().zip(&packets) {
            prop_assert_eq!(emitted.bytes(), expected.as_slice());
        }
        prop_assert_eq!(service.counters().packet_sequence_errors, 0);
    }
}
