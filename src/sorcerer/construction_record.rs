//! Binary construction record
//!
//! Big-endian summary written next to each dataset. The layout is
//!
//! ```text
//! header:  major u8, minor u8, type u8, reserved u8, name [36],
//!          is_test u8, reserved u8, reserved u64, dataset_count u16,
//!          start_esh i64, stop_esh i64, total_fill_bytes i64,
//!          wrong_length_count i32, first_packet_time i64,
//!          last_packet_time i64, first_esh i64, last_esh i64,
//!          rs_corrected i32, total_packets i32, total_bytes i64,
//!          total_gaps i32, last_esh i64, appid_count i64
//! appid:   spid u16, apid u16, first_byte i64, vcid_count i32,
//!          (vcid | spid << 6) i32 per vcid,
//!          gaps i32 + (first_missing i32, byte_offset i64, missing i64,
//!                      before_time i64, after_time i64,
//!                      before_esh i64, after_esh i64) per gap,
//!          checksums i32 (always 0),
//!          fills i32 + (sequence i32, byte_offset i64, fill_offset i32) per fill,
//!          wrong_lengths i32 + sequence i32 per entry,
//!          first_packet_time i64, last_packet_time i64, first_esh i64,
//!          last_esh i64, rs_corrected i32, packets i32, bytes i64,
//!          reserved i64
//! files:   file_count i32 (data files plus this record), record name [36],
//!          7 x reserved i32, then per data file: name [36], appid_count i32,
//!          (spid u16, apid u16, start i64, stop i64, reserved i32) per appid
//! ```
//!
//! Names are ASCII, space padded to 36 bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::appid::Appid;
use super::fill_list::FillEntry;
use crate::config::DatasetKind;
use crate::types::CdsTime;
use crate::{Result, TelemetryError};

pub const MAJOR_VERSION: u8 = 2;
pub const MINOR_VERSION: u8 = 0;
/// Width of every name field.
pub const NAME_LENGTH: usize = 36;
const FILE_RESERVED_WORDS: usize = 7;

fn kind_code(kind: DatasetKind) -> u8 {
    match kind {
        DatasetKind::Pds => 1,
        DatasetKind::Eds => 2,
    }
}

fn kind_from_code(code: u8) -> Result<DatasetKind> {
    match code {
        1 => Ok(DatasetKind::Pds),
        2 => Ok(DatasetKind::Eds),
        other => Err(TelemetryError::parse_error("construction record", format!("unknown dataset type {}", other))),
    }
}

/// One gap as stored in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapRecord {
    pub first_missing: u32,
    pub byte_offset: u64,
    pub missing: u64,
    pub before_packet_time: CdsTime,
    pub after_packet_time: CdsTime,
    pub before_esh: CdsTime,
    pub after_esh: CdsTime,
}

/// Statistics block of one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppidRecord {
    pub spacecraft: u16,
    pub id: u16,
    pub first_byte: u64,
    pub vcids: Vec<u8>,
    pub gaps: Vec<GapRecord>,
    pub fills: Vec<FillEntry>,
    pub fill_bytes: u64,
    pub wrong_lengths: Vec<u16>,
    pub first_packet_time: CdsTime,
    pub last_packet_time: CdsTime,
    pub first_esh: CdsTime,
    pub last_esh: CdsTime,
    pub rs_corrected: u32,
    pub packets: u32,
    pub bytes: u64,
}

impl AppidRecord {
    pub fn from_appid(appid: &Appid) -> Self {
        let gaps = appid
            .gaps()
            .gaps()
            .iter()
            .map(|gap| GapRecord {
                first_missing: gap.first_missing,
                byte_offset: gap.byte_offset,
                missing: gap.missing as u64,
                before_packet_time: gap.before.packet_time,
                after_packet_time: gap.after.packet_time,
                before_esh: gap.before.esh_time,
                after_esh: gap.after.esh_time,
            })
            .collect();
        Self {
            spacecraft: appid.spacecraft(),
            id: appid.id(),
            first_byte: appid.first_byte().unwrap_or(0),
            vcids: appid.vcids().to_vec(),
            gaps,
            fills: appid.fills().entries().to_vec(),
            fill_bytes: appid.fills().fill_bytes(),
            wrong_lengths: appid.wrong_lengths().sequences().to_vec(),
            first_packet_time: appid.first().map(|k| k.packet_time).unwrap_or_default(),
            last_packet_time: appid.last().map(|k| k.packet_time).unwrap_or_default(),
            first_esh: appid.first_esh().unwrap_or_default(),
            last_esh: appid.last_esh().unwrap_or_default(),
            rs_corrected: appid.rs_corrected(),
            packets: appid.packets(),
            bytes: appid.bytes(),
        }
    }
}

/// Time range of one application inside one data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAppidRange {
    pub spacecraft: u16,
    pub apid: u16,
    pub start: CdsTime,
    pub stop: CdsTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub appids: Vec<FileAppidRange>,
}

/// Contents of a construction record.
///
/// Totals are derived from the appid blocks by [`ConstructionRecord::new`];
/// [`ConstructionRecord::read`] takes them from the bytes as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructionRecord {
    pub kind: DatasetKind,
    pub name: String,
    pub is_test: bool,
    pub dataset_count: u16,
    pub total_fill_bytes: u64,
    pub wrong_length_count: u32,
    pub first_packet_time: CdsTime,
    pub last_packet_time: CdsTime,
    pub first_esh: CdsTime,
    pub last_esh: CdsTime,
    pub rs_corrected: u32,
    pub total_packets: u32,
    pub total_bytes: u64,
    pub total_gaps: u32,
    pub appids: Vec<AppidRecord>,
    pub files: Vec<FileRecord>,
}

impl ConstructionRecord {
    pub fn new(kind: DatasetKind, name: &str, is_test: bool, appids: Vec<AppidRecord>, files: Vec<FileRecord>) -> Self {
        let with_data: Vec<&AppidRecord> = appids.iter().filter(|a| a.packets > 0).collect();
        let min_of = |f: fn(&AppidRecord) -> CdsTime| with_data.iter().map(|a| f(a)).min().unwrap_or_default();
        let max_of = |f: fn(&AppidRecord) -> CdsTime| with_data.iter().map(|a| f(a)).max().unwrap_or_default();
        Self {
            kind,
            name: name.to_string(),
            is_test,
            dataset_count: 1,
            total_fill_bytes: appids.iter().map(|a| a.fill_bytes).sum(),
            wrong_length_count: appids.iter().map(|a| a.wrong_lengths.len() as u32).sum(),
            first_packet_time: min_of(|a| a.first_packet_time),
            last_packet_time: max_of(|a| a.last_packet_time),
            first_esh: min_of(|a| a.first_esh),
            last_esh: max_of(|a| a.last_esh),
            rs_corrected: appids.iter().map(|a| a.rs_corrected).sum(),
            total_packets: appids.iter().map(|a| a.packets).sum(),
            total_bytes: appids.iter().map(|a| a.bytes).sum(),
            total_gaps: appids.iter().map(|a| a.gaps.len() as u32).sum(),
            appids,
            files,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(256);
        self.write_to(&mut buf);
        buf.freeze()
    }

    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(MAJOR_VERSION);
        buf.put_u8(MINOR_VERSION);
        buf.put_u8(kind_code(self.kind));
        buf.put_u8(0);
        put_name(buf, &self.name);
        buf.put_u8(self.is_test as u8);
        buf.put_u8(0);
        buf.put_u64(0);
        buf.put_u16(self.dataset_count);
        buf.put_i64(self.first_esh.as_i64());
        buf.put_i64(self.last_esh.as_i64());
        buf.put_i64(self.total_fill_bytes as i64);
        buf.put_i32(self.wrong_length_count as i32);
        buf.put_i64(self.first_packet_time.as_i64());
        buf.put_i64(self.last_packet_time.as_i64());
        buf.put_i64(self.first_esh.as_i64());
        buf.put_i64(self.last_esh.as_i64());
        buf.put_i32(self.rs_corrected as i32);
        buf.put_i32(self.total_packets as i32);
        buf.put_i64(self.total_bytes as i64);
        buf.put_i32(self.total_gaps as i32);
        buf.put_i64(self.last_esh.as_i64());
        buf.put_i64(self.appids.len() as i64);

        for appid in &self.appids {
            write_appid(buf, appid);
        }

        buf.put_i32(self.files.len() as i32 + 1);
        put_name(buf, &self.name);
        for _ in 0..FILE_RESERVED_WORDS {
            buf.put_i32(0);
        }
        for file in &self.files {
            put_name(buf, &file.name);
            buf.put_i32(file.appids.len() as i32);
            for range in &file.appids {
                buf.put_u16(range.spacecraft);
                buf.put_u16(range.apid);
                buf.put_i64(range.start.as_i64());
                buf.put_i64(range.stop.as_i64());
                buf.put_i32(0);
            }
        }
    }

    /// Parse a record produced by [`write_to`](Self::write_to).
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        need(&buf, 4 + NAME_LENGTH + 12, "header")?;
        let major = buf.get_u8();
        if major != MAJOR_VERSION {
            return Err(TelemetryError::parse_error("construction record", format!("unsupported version {}", major)));
        }
        let _minor = buf.get_u8();
        let kind = kind_from_code(buf.get_u8())?;
        buf.advance(1);
        let name = get_name(&mut buf)?;
        let is_test = buf.get_u8() != 0;
        buf.advance(1 + 8);
        let dataset_count = buf.get_u16();

        need(&buf, 8 * 3 + 4 + 8 * 4 + 4 * 2 + 8 + 4 + 8 + 8, "header totals")?;
        let _start_esh = buf.get_i64();
        let _stop_esh = buf.get_i64();
        let total_fill_bytes = buf.get_i64() as u64;
        let wrong_length_count = buf.get_i32() as u32;
        let first_packet_time = get_time(&mut buf);
        let last_packet_time = get_time(&mut buf);
        let first_esh = get_time(&mut buf);
        let last_esh = get_time(&mut buf);
        let rs_corrected = buf.get_i32() as u32;
        let total_packets = buf.get_i32() as u32;
        let total_bytes = buf.get_i64() as u64;
        let total_gaps = buf.get_i32() as u32;
        let _completion = buf.get_i64();
        let appid_count = buf.get_i64();

        let mut appids = Vec::new();
        for _ in 0..appid_count.max(0) {
            appids.push(read_appid(&mut buf)?);
        }

        need(&buf, 4 + NAME_LENGTH + 4 * FILE_RESERVED_WORDS, "file list")?;
        let file_count = buf.get_i32();
        let _record_name = get_name(&mut buf)?;
        buf.advance(4 * FILE_RESERVED_WORDS);
        let mut files = Vec::new();
        for _ in 1..file_count.max(1) {
            need(&buf, NAME_LENGTH + 4, "file block")?;
            let name = get_name(&mut buf)?;
            let count = buf.get_i32();
            let mut ranges = Vec::new();
            for _ in 0..count.max(0) {
                need(&buf, 2 + 2 + 8 + 8 + 4, "file appid")?;
                let spacecraft = buf.get_u16();
                let apid = buf.get_u16();
                let start = get_time(&mut buf);
                let stop = get_time(&mut buf);
                buf.advance(4);
                ranges.push(FileAppidRange { spacecraft, apid, start, stop });
            }
            files.push(FileRecord { name, appids: ranges });
        }

        Ok(Self {
            kind,
            name,
            is_test,
            dataset_count,
            total_fill_bytes,
            wrong_length_count,
            first_packet_time,
            last_packet_time,
            first_esh,
            last_esh,
            rs_corrected,
            total_packets,
            total_bytes,
            total_gaps,
            appids,
            files,
        })
    }
}

fn write_appid<B: BufMut>(buf: &mut B, appid: &AppidRecord) {
    buf.put_u16(appid.spacecraft);
    buf.put_u16(appid.id);
    buf.put_i64(appid.first_byte as i64);
    buf.put_i32(appid.vcids.len() as i32);
    for vcid in &appid.vcids {
        buf.put_i32((*vcid as i32 & 0x3F) | ((appid.spacecraft as i32) << 6));
    }

    buf.put_i32(appid.gaps.len() as i32);
    for gap in &appid.gaps {
        buf.put_i32(gap.first_missing as i32);
        buf.put_i64(gap.byte_offset as i64);
        buf.put_i64(gap.missing as i64);
        buf.put_i64(gap.before_packet_time.as_i64());
        buf.put_i64(gap.after_packet_time.as_i64());
        buf.put_i64(gap.before_esh.as_i64());
        buf.put_i64(gap.after_esh.as_i64());
    }

    // No per-packet checksums are kept
    buf.put_i32(0);

    buf.put_i32(appid.fills.len() as i32);
    for fill in &appid.fills {
        buf.put_i32(fill.sequence as i32);
        buf.put_i64(fill.byte_offset as i64);
        buf.put_i32(fill.fill_offset as i32);
    }

    buf.put_i32(appid.wrong_lengths.len() as i32);
    for sequence in &appid.wrong_lengths {
        buf.put_i32(*sequence as i32);
    }

    buf.put_i64(appid.first_packet_time.as_i64());
    buf.put_i64(appid.last_packet_time.as_i64());
    buf.put_i64(appid.first_esh.as_i64());
    buf.put_i64(appid.last_esh.as_i64());
    buf.put_i32(appid.rs_corrected as i32);
    buf.put_i32(appid.packets as i32);
    buf.put_i64(appid.bytes as i64);
    buf.put_i64(0);
}

fn read_appid(buf: &mut &[u8]) -> Result<AppidRecord> {
    need(buf, 2 + 2 + 8 + 4, "appid block")?;
    let spacecraft = buf.get_u16();
    let id = buf.get_u16();
    let first_byte = buf.get_i64() as u64;
    let vcid_count = buf.get_i32().max(0) as usize;
    need(buf, 4 * vcid_count + 4, "vcids")?;
    let vcids = (0..vcid_count).map(|_| (buf.get_i32() & 0x3F) as u8).collect();

    let gap_count = buf.get_i32().max(0) as usize;
    need(buf, gap_count * (4 + 8 * 6) + 4 + 4, "gap list")?;
    let gaps = (0..gap_count)
        .map(|_| GapRecord {
            first_missing: buf.get_i32() as u32,
            byte_offset: buf.get_i64() as u64,
            missing: buf.get_i64() as u64,
            before_packet_time: get_time(buf),
            after_packet_time: get_time(buf),
            before_esh: get_time(buf),
            after_esh: get_time(buf),
        })
        .collect();

    let _checksums = buf.get_i32();
    let fill_count = buf.get_i32().max(0) as usize;
    need(buf, fill_count * 16 + 4, "fill list")?;
    let fills: Vec<FillEntry> = (0..fill_count)
        .map(|_| FillEntry {
            sequence: buf.get_i32() as u16,
            byte_offset: buf.get_i64() as u64,
            fill_offset: buf.get_i32() as u32,
        })
        .collect();

    let wrong_count = buf.get_i32().max(0) as usize;
    need(buf, wrong_count * 4 + 8 * 4 + 4 * 2 + 8 * 2, "wrong length list")?;
    let wrong_lengths = (0..wrong_count).map(|_| buf.get_i32() as u16).collect();

    let first_packet_time = get_time(buf);
    let last_packet_time = get_time(buf);
    let first_esh = get_time(buf);
    let last_esh = get_time(buf);
    let rs_corrected = buf.get_i32() as u32;
    let packets = buf.get_i32() as u32;
    let bytes = buf.get_i64() as u64;
    buf.advance(8);

    Ok(AppidRecord {
        spacecraft,
        id,
        first_byte,
        vcids,
        gaps,
        fills,
        // Fill byte totals are only kept in the header
        fill_bytes: 0,
        wrong_lengths,
        first_packet_time,
        last_packet_time,
        first_esh,
        last_esh,
        rs_corrected,
        packets,
        bytes,
    })
}

fn put_name<B: BufMut>(buf: &mut B, name: &str) {
    let mut field = [b' '; NAME_LENGTH];
    for (slot, byte) in field.iter_mut().zip(name.bytes().filter(u8::is_ascii)) {
        *slot = byte;
    }
    buf.put_slice(&field);
}

fn get_name(buf: &mut &[u8]) -> Result<String> {
    need(buf, NAME_LENGTH, "name")?;
    let mut field = [0u8; NAME_LENGTH];
    buf.copy_to_slice(&mut field);
    let text = std::str::from_utf8(&field)
        .map_err(|e| TelemetryError::parse_error("construction record name", e.to_string()))?;
    Ok(text.trim_end_matches(' ').to_string())
}

fn get_time(buf: &mut &[u8]) -> CdsTime {
    CdsTime(buf.get_i64() as u64)
}

fn need(buf: &&[u8], length: usize, what: &str) -> Result<()> {
    if buf.remaining() < length {
        return Err(TelemetryError::parse_error(
            "construction record",
            format!("truncated {}: need {} bytes, have {}", what, length, buf.remaining()),
        ));
    }
    Ok(())
}
