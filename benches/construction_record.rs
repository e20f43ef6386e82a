//! Benchmarks for construction record serialization
//!
//! A record with many applications and gaps is the worst case at the end of
//! a long pass. Run with `--features benchmark`.

use criterion::{Criterion, criterion_group, criterion_main};
use downlink::config::DatasetKind;
use downlink::sorcerer::{AppidRecord, ConstructionRecord, FileAppidRange, FileRecord, GapRecord};
use downlink::CdsTime;
use std::hint::black_box;

fn appid(id: u16) -> AppidRecord {
    let gaps = (0..50u32)
        .map(|i| GapRecord {
            first_missing: i * 100,
            byte_offset: i as u64 * 64_000,
            missing: 3,
            before_packet_time: CdsTime(i as u64 * 10),
            after_packet_time: CdsTime(i as u64 * 10 + 4),
            before_esh: CdsTime(i as u64 * 10),
            after_esh: CdsTime(i as u64 * 10 + 4),
        })
        .collect();
    AppidRecord {
        spacecraft: 42,
        id,
        first_byte: 0,
        vcids: vec![16],
        gaps,
        fills: Vec::new(),
        fill_bytes: 0,
        wrong_lengths: Vec::new(),
        first_packet_time: CdsTime(0),
        last_packet_time: CdsTime(1_000),
        first_esh: CdsTime(0),
        last_esh: CdsTime(1_000),
        rs_corrected: 0,
        packets: 5_000,
        bytes: 320_000,
    }
}

fn record() -> ConstructionRecord {
    let appids: Vec<AppidRecord> = (64..96).map(appid).collect();
    let files = (1..=10u16)
        .map(|index| FileRecord {
            name: format!("P0420064AAAAAAAAAAAA24061120000{}.PDS", index % 10),
            appids: (64..96)
                .map(|apid| FileAppidRange { spacecraft: 42, apid, start: CdsTime(0), stop: CdsTime(1_000) })
                .collect(),
        })
        .collect();
    ConstructionRecord::new(DatasetKind::Pds, "P0420064AAAAAAAAAAAA240611200000.PDS", false, appids, files)
}

fn bench_construction_record(c: &mut Criterion) {
    let record = record();
    let bytes = record.to_bytes();

    c.bench_function("construction_record_write", |b| b.iter(|| black_box(record.to_bytes())));
    c.bench_function("construction_record_read", |b| {
        b.iter(|| black_box(ConstructionRecord::read(black_box(&bytes)).expect("valid record")))
    });
}

criterion_group!(benches, bench_construction_record);
criterion_main!(benches);
