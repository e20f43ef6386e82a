//! Reassembly across frame boundaries and link losses

mod common;

use common::{Downlinker, SCIENCE_VC, layout_config, packet, time};
use downlink::config::PathConfig;
use downlink::frame::{FrameLayout, FrameSequencer};
use downlink::path::PathService;
use downlink::routing::FrameReceiver;
use downlink::{Packet, StatusReporter};
use proptest::prelude::*;

type Chain = FrameSequencer<PathService<Vec<Packet>>>;

fn chain() -> Chain {
    let layout = FrameLayout::new(&layout_config()).unwrap();
    let service = PathService::new(&PathConfig::default(), layout.clone(), Vec::new()).unwrap();
    FrameSequencer::new(layout, service)
}

fn originals(lengths: &[usize]) -> Vec<Vec<u8>> {
    lengths.iter().enumerate().map(|(i, &len)| packet(64, i as u16, len, time(i as u32))).collect()
}

#[test]
fn contiguous_stream_is_byte_exact() -> anyhow::Result<()> {
    let packets = originals(&[14, 200, 113, 114, 115, 500, 20]);
    let mut link = Downlinker::new(SCIENCE_VC);
    for packet in &packets {
        link.push(packet);
    }

    let mut chain = chain();
    for mut frame in link.frames() {
        chain.put_frame(&mut frame)?;
    }

    let out = chain.get_ref().output();
    anyhow::ensure!(out.len() == packets.len(), "expected {} packets, got {}", packets.len(), out.len());
    for (emitted, expected) in out.iter().zip(&packets) {
        assert_eq!(emitted.bytes(), expected.as_slice());
        assert!(!emitted.annotation.has_fill);
    }
    assert_eq!(chain.get_ref().counters().discarded_fragments, 0);
    Ok(())
}

#[test]
fn flush_pads_the_packet_cut_off_by_end_of_input() {
    let mut link = Downlinker::new(SCIENCE_VC);
    let capacity = link.capacity();
    let long = packet(64, 0, 2 * capacity + 50, time(0));
    link.push(&long);
    let frames = link.frames();
    assert_eq!(frames.len(), 3);

    let mut chain = chain();
    for mut frame in frames.into_iter().take(2) {
        chain.put_frame(&mut frame).unwrap();
    }
    assert!(chain.get_ref().output().is_empty());

    chain.flush().unwrap();
    let out = chain.get_ref().output();
    assert_eq!(out.len(), 1);
    let padded = &out[0];
    assert!(padded.annotation.has_fill);
    assert_eq!(padded.annotation.good_byte_count, 2 * capacity);
    assert_eq!(padded.len(), long.len());
    assert_eq!(&padded.bytes()[..2 * capacity], &long[..2 * capacity]);
    assert!(padded.bytes()[2 * capacity..].iter().all(|&b| b == 0xC9));
}

#[test]
fn lost_frame_drops_only_the_packets_it_touched() {
    let mut link = Downlinker::new(SCIENCE_VC);
    let capacity = link.capacity();
    // Each packet fills exactly one frame
    let packets: Vec<Vec<u8>> = (0..6).map(|i| packet(64, i, capacity, time(i as u32))).collect();
    for packet in &packets {
        link.push(packet);
    }
    let frames = link.frames();

    let mut chain = chain();
    for (index, mut frame) in frames.into_iter().enumerate() {
        if index != 2 {
            chain.put_frame(&mut frame).unwrap();
        }
    }

    let sequences: Vec<u16> = chain.get_ref().output().iter().map(|p| p.sequence_count()).collect();
    assert_eq!(sequences, vec![0, 1, 3, 4, 5]);
    let status = chain.status();
    assert_eq!(status.iter().find(|item| item.name == "sequence_errors").map(|item| item.value), Some(1));
    assert_eq!(chain.get_ref().counters().packet_sequence_errors, 1);
}

proptest! {
    #[test]
    fn prop_delivered_packets_match_what_was_sent(
        lengths in prop::collection::vec(14usize..300, 1..40),
        lost in prop::collection::btree_set(0usize..60, 0..6),
    ) {
        let packets = originals(&lengths);
        let mut link = Downlinker::new(SCIENCE_VC);
        for packet in &packets {
            link.push(packet);
        }

        let mut chain = chain();
        for (index, mut frame) in link.frames().into_iter().enumerate() {
            if !lost.contains(&index) {
                chain.put_frame(&mut frame).unwrap();
            }
        }
        chain.flush().unwrap();

        let out = chain.get_ref().output();
        prop_assert!(out.len() <= packets.len());
        for emitted in out {
            prop_assert_eq!(emitted.application_id(), 64);
            let original = &packets[emitted.sequence_count() as usize];
            prop_assert_eq!(emitted.len(), original.len());
            let good = emitted.annotation.good_byte_count;
            prop_assert_eq!(&emitted.bytes()[..good], &original[..good]);
            if emitted.annotation.has_fill {
                prop_assert!(emitted.bytes()[good..].iter().all(|&b| b == 0xC9));
            } else {
                prop_assert_eq!(good, original.len());
            }
        }
        if lost.is_empty() {
            prop_assert_eq!(out.len(), packets.len());
        }
    }
}
