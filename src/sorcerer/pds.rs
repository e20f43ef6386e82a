//! Production dataset writer
//!
//! [`PdsOutput`] is the packet sink at the end of each dataset route. It
//! files every accepted packet under its [`Appid`], appends it to the
//! current data file and, on flush, writes the construction record that
//! describes the session's files.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use super::appid::Appid;
use super::construction_record::{AppidRecord, ConstructionRecord, FileAppidRange, FileRecord};
use super::session::SessionContext;
use crate::config::{DatasetConfig, DatasetKind, OutputConfig};
use crate::output::ErrorGate;
use crate::routing::PacketReceiver;
use crate::types::{CdsTime, ComponentStatus, Packet, PRIMARY_HEADER_LENGTH, StatusItem, StatusReporter, file_name_stamp};
use crate::{Result, TelemetryError};

/// Octet holding the quicklook flag: first byte after an 8-byte secondary
/// header time.
pub const QUICKLOOK_BYTE: usize = PRIMARY_HEADER_LENGTH + 8;
pub const QUICKLOOK_MASK: u8 = 0x80;
/// File character of the construction record.
const RECORD_FILE_INDEX: u32 = 0;
/// Highest file character (`Z`).
const LAST_FILE_INDEX: u32 = 35;

pub fn has_quicklook_flag(packet: &Packet) -> bool {
    packet.bytes().get(QUICKLOOK_BYTE).is_some_and(|b| b & QUICKLOOK_MASK != 0)
}

struct DataFile {
    name: String,
    writer: BufWriter<File>,
    bytes: u64,
    ranges: BTreeMap<u16, (CdsTime, CdsTime)>,
}

/// Writes one dataset's data files and construction record.
pub struct PdsOutput {
    name: String,
    kind: DatasetKind,
    spacecraft: u16,
    is_test: bool,
    quicklook: bool,
    appids: BTreeMap<u16, Appid>,
    session: Arc<SessionContext>,
    directory: PathBuf,
    bytes_per_file: u64,
    gate: ErrorGate,
    current: Option<DataFile>,
    files: Vec<FileRecord>,
    file_index: u32,
    dataset_bytes: u64,
    last_packet_time: Option<CdsTime>,
    packets: u64,
    written: u64,
    written_bytes: u64,
    unknown_apids: u64,
    quicklook_rejects: u64,
    length_rejects: u64,
    discarded: u64,
    data_files: u64,
    records: u64,
}

impl PdsOutput {
    pub fn new(config: &DatasetConfig, output: &OutputConfig, session: Arc<SessionContext>) -> Result<Self> {
        config.validate()?;
        let mut appids = BTreeMap::new();
        for appid in &config.appids {
            appids.insert(appid.id, Appid::new(config.spacecraft, appid)?);
        }
        std::fs::create_dir_all(&output.directory)
            .map_err(|e| TelemetryError::file_error(output.directory.clone(), e))?;

        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            spacecraft: config.spacecraft,
            is_test: config.is_test,
            quicklook: config.quicklook,
            appids,
            session,
            directory: output.directory.clone(),
            bytes_per_file: output.bytes_per_file,
            gate: ErrorGate::new(output.max_consecutive_io_errors),
            current: None,
            files: Vec::new(),
            file_index: RECORD_FILE_INDEX,
            dataset_bytes: 0,
            last_packet_time: None,
            packets: 0,
            written: 0,
            written_bytes: 0,
            unknown_apids: 0,
            quicklook_rejects: 0,
            length_rejects: 0,
            discarded: 0,
            data_files: 0,
            records: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn appid(&self, id: u16) -> Option<&Appid> {
        self.appids.get(&id)
    }

    pub fn appids(&self) -> impl Iterator<Item = &Appid> {
        self.appids.values()
    }

    /// Bytes written to the dataset in the current session.
    pub fn dataset_bytes(&self) -> u64 {
        self.dataset_bytes
    }

    /// Name of a dataset file for the session stamp and file index.
    pub fn file_name(&self, stamp: DateTime<Utc>, index: u32) -> Option<String> {
        let file_char = char::from_digit(index, 36)?.to_ascii_uppercase();
        let first_apid = self.appids.keys().next().copied().unwrap_or(0);
        let prefix = match self.kind {
            DatasetKind::Pds => 'P',
            DatasetKind::Eds => 'E',
        };
        Some(format!(
            "{}{:03}{:04}AAAAAAAAAAAA{}{}.PDS",
            prefix,
            self.spacecraft,
            first_apid,
            file_name_stamp(stamp),
            file_char
        ))
    }

    fn accept(&mut self, packet: &Packet) {
        self.packets += 1;
        let apid = packet.application_id();
        let Some(appid) = self.appids.get(&apid) else {
            self.unknown_apids += 1;
            trace!("Dataset {} has no application {}", self.name, apid);
            return;
        };
        if self.quicklook && !has_quicklook_flag(packet) {
            self.quicklook_rejects += 1;
            return;
        }
        if packet.declared_length() != Some(packet.len()) {
            self.length_rejects += 1;
            debug!("Dataset {} rejected apid {} packet of {} bytes", self.name, apid, packet.len());
            return;
        }
        if self.gate.is_tripped() {
            self.discarded += 1;
            return;
        }

        let kernel = appid.kernel(packet, self.dataset_bytes);
        if self.should_rotate(kernel.packet_time) {
            self.close_current();
        }
        if self.current.is_none() && !self.open_next() {
            self.discarded += 1;
            return;
        }
        let Some(file) = self.current.as_mut() else {
            return;
        };

        let outcome = file.writer.write_all(packet.bytes());
        if outcome.is_err() {
            self.discarded += 1;
            self.gate.record(&self.name, &outcome);
            return;
        }
        self.gate.record(&self.name, &outcome);

        let length = packet.len() as u64;
        file.bytes += length;
        file.ranges
            .entry(apid)
            .and_modify(|(start, stop)| {
                *start = (*start).min(kernel.packet_time);
                *stop = (*stop).max(kernel.packet_time);
            })
            .or_insert((kernel.packet_time, kernel.packet_time));
        if let Some(appid) = self.appids.get_mut(&apid) {
            appid.accept(packet, kernel);
        }
        self.dataset_bytes += length;
        self.written += 1;
        self.written_bytes += length;
        self.last_packet_time = Some(kernel.packet_time);
    }

    /// Rotate only when the file is full and the next packet is strictly
    /// later than the previous one.
    fn should_rotate(&self, packet_time: CdsTime) -> bool {
        let Some(file) = &self.current else {
            return false;
        };
        self.bytes_per_file > 0
            && file.bytes >= self.bytes_per_file
            && self.file_index < LAST_FILE_INDEX
            && self.last_packet_time.is_none_or(|last| last < packet_time)
    }

    fn open_next(&mut self) -> bool {
        let index = self.file_index + 1;
        let Some(name) = self.file_name(self.session.stamp(), index) else {
            return false;
        };
        let path = self.directory.join(&name);
        match File::create(&path) {
            Ok(file) => {
                self.gate.record(&self.name, &Ok(()));
                info!("Opened data file {}", path.display());
                self.file_index = index;
                self.data_files += 1;
                self.current = Some(DataFile { name, writer: BufWriter::new(file), bytes: 0, ranges: BTreeMap::new() });
                true
            }
            Err(error) => {
                self.gate.record(&self.name, &Err(error));
                false
            }
        }
    }

    fn close_current(&mut self) {
        let Some(mut file) = self.current.take() else {
            return;
        };
        let outcome = file.writer.flush();
        self.gate.record(&self.name, &outcome);
        info!("Closed data file {} ({} bytes)", file.name, file.bytes);
        let appids = file
            .ranges
            .iter()
            .map(|(apid, (start, stop))| FileAppidRange {
                spacecraft: self.spacecraft,
                apid: *apid,
                start: *start,
                stop: *stop,
            })
            .collect();
        self.files.push(FileRecord { name: file.name, appids });
    }

    /// Push buffered packet bytes to the current data file.
    pub fn sync(&mut self) {
        if let Some(file) = self.current.as_mut() {
            let outcome = file.writer.flush();
            self.gate.record(&self.name, &outcome);
        }
    }

    /// End the session: close the data file and write the construction
    /// record. Returns `None` when nothing was written since the last flush.
    pub fn flush(&mut self) -> Result<Option<ConstructionRecord>> {
        self.close_current();
        if self.files.is_empty() {
            return Ok(None);
        }

        let stamp = self.session.stamp();
        let name = self
            .file_name(stamp, RECORD_FILE_INDEX)
            .ok_or_else(|| TelemetryError::config_error("dataset", "no construction record name"))?;
        let appids = self.appids.values().map(AppidRecord::from_appid).collect();
        let record = ConstructionRecord::new(self.kind, &name, self.is_test, appids, self.files.clone());

        let path = self.directory.join(&name);
        if let Err(error) = std::fs::write(&path, record.to_bytes()) {
            warn!("Failed to write construction record {}: {}", path.display(), error);
            return Err(TelemetryError::output_error(self.name.clone(), error));
        }
        info!(
            "Wrote construction record {} ({} packets, {} gaps, {} files)",
            path.display(),
            record.total_packets,
            record.total_gaps,
            record.files.len()
        );

        self.records += 1;
        self.files.clear();
        self.file_index = RECORD_FILE_INDEX;
        self.dataset_bytes = 0;
        self.last_packet_time = None;
        self.gate.reset();
        for appid in self.appids.values_mut() {
            appid.clear();
        }
        Ok(Some(record))
    }
}

impl StatusReporter for PdsOutput {
    fn status_name(&self) -> String {
        format!("dataset {}", self.name)
    }

    fn status(&self) -> Vec<StatusItem> {
        let gaps: usize = self.appids.values().map(|a| a.gaps().len()).sum();
        let fills: usize = self.appids.values().map(|a| a.fills().len()).sum();
        vec![
            StatusItem::new("packets", self.packets),
            StatusItem::new("written_packets", self.written),
            StatusItem::new("written_bytes", self.written_bytes),
            StatusItem::new("unknown_apids", self.unknown_apids),
            StatusItem::new("quicklook_rejects", self.quicklook_rejects),
            StatusItem::new("length_rejects", self.length_rejects),
            StatusItem::new("io_errors", self.gate.total()),
            StatusItem::new("discarded", self.discarded),
            StatusItem::new("data_files", self.data_files),
            StatusItem::new("construction_records", self.records),
            StatusItem::new("session_gaps", gaps as u64),
            StatusItem::new("session_fill_packets", fills as u64),
        ]
    }
}

/// Shared handle to a [`PdsOutput`].
///
/// One dataset may be fed from several virtual channels and flushed from a
/// command task. While a flush runs, packets handed to any clone are
/// dropped instead of waiting for it.
#[derive(Clone)]
pub struct PdsHandle {
    inner: Arc<Mutex<PdsOutput>>,
    flushing: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl PdsHandle {
    pub fn new(output: PdsOutput) -> Self {
        Self {
            inner: Arc::new(Mutex::new(output)),
            flushing: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PdsOutput> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the output.
    pub fn with_output<T>(&self, f: impl FnOnce(&PdsOutput) -> T) -> T {
        f(&self.lock())
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    pub fn component_status(&self) -> ComponentStatus {
        ComponentStatus::of(self)
    }

    /// Packets dropped because a flush was running.
    pub fn dropped_during_flush(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Flush the dataset and return its construction record.
    pub fn finish(&self) -> Result<Option<ConstructionRecord>> {
        self.flushing.store(true, Ordering::Release);
        let result = self.lock().flush();
        self.flushing.store(false, Ordering::Release);
        result
    }

    fn dropping(&self, count: usize) -> bool {
        if self.is_flushing() {
            self.dropped.fetch_add(count as u64, Ordering::Relaxed);
            return true;
        }
        false
    }
}

impl PacketReceiver for PdsHandle {
    fn put_packet(&mut self, packet: &mut Packet) -> Result<()> {
        if packet.is_deleted() || self.dropping(1) {
            return Ok(());
        }
        self.lock().accept(packet);
        Ok(())
    }

    fn put_packets(&mut self, packets: &mut [Packet]) -> Result<()> {
        if self.dropping(packets.len()) {
            return Ok(());
        }
        let mut output = self.lock();
        for packet in packets.iter().filter(|p| !p.is_deleted()) {
            output.accept(packet);
        }
        Ok(())
    }

    /// Syncs the data file; the session only ends with [`PdsHandle::finish`].
    fn flush(&mut self) -> Result<()> {
        self.lock().sync();
        Ok(())
    }
}

impl StatusReporter for PdsHandle {
    fn status_name(&self) -> String {
        self.lock().status_name()
    }

    fn status(&self) -> Vec<StatusItem> {
        let mut items = self.lock().status();
        items.push(StatusItem::new("dropped_during_flush", self.dropped_during_flush()));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppidConfig, LengthRuleConfig};
    use crate::test_utils::packet_with_time;
    use chrono::TimeZone;

    fn dataset(quicklook: bool) -> DatasetConfig {
        DatasetConfig {
            name: "science".into(),
            spacecraft: 42,
            kind: DatasetKind::Pds,
            is_test: false,
            quicklook,
            appids: vec![AppidConfig {
                id: 64,
                vcids: vec![30],
                sequence_step: 1,
                time_code: Default::default(),
                lengths: LengthRuleConfig::default(),
            }],
        }
    }

    fn scratch_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("downlink-pds-{}-{}", test, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn output(test: &str, quicklook: bool, bytes_per_file: u64) -> PdsOutput {
        let session = Arc::new(SessionContext::new());
        session.set_timestamp(Utc.with_ymd_and_hms(2024, 2, 1, 13, 14, 15).unwrap());
        let config = OutputConfig { directory: scratch_dir(test), bytes_per_file, ..OutputConfig::default() };
        PdsOutput::new(&dataset(quicklook), &config, session).unwrap()
    }

    fn packet(sequence: u16, millis: u32) -> Packet {
        let time = CdsTime::from_parts(24_000, millis, 0);
        Packet::from_bytes(&packet_with_time(64, sequence, 40, time)).unwrap()
    }

    #[test]
    fn file_names_follow_the_convention() {
        let output = output("names", false, 0);
        let stamp = output.session.stamp();
        assert_eq!(output.file_name(stamp, 0).unwrap(), "P0420064AAAAAAAAAAAA240321314150.PDS");
        assert_eq!(output.file_name(stamp, 11).unwrap(), "P0420064AAAAAAAAAAAA24032131415B.PDS");
        assert_eq!(output.file_name(stamp, 0).unwrap().len(), 36);
    }

    #[test]
    fn writes_data_and_record() {
        let mut output = output("record", false, 0);
        for (sequence, millis) in [(0u16, 100u32), (1, 200), (3, 300)] {
            output.accept(&packet(sequence, millis));
        }
        let record = output.flush().unwrap().unwrap();
        assert_eq!(record.total_packets, 3);
        assert_eq!(record.total_bytes, 120);
        assert_eq!(record.total_gaps, 1);
        assert_eq!(record.files.len(), 1);

        let data = std::fs::read(output.directory().join(&record.files[0].name)).unwrap();
        assert_eq!(data.len(), 120);
        let on_disk = std::fs::read(output.directory().join(&record.name)).unwrap();
        let parsed = ConstructionRecord::read(&on_disk).unwrap();
        assert_eq!(parsed.total_packets, 3);
        assert_eq!(parsed.files, record.files);

        assert!(output.flush().unwrap().is_none());
        let _ = std::fs::remove_dir_all(output.directory());
    }

    #[test]
    fn rejects_wrong_declared_length_and_cleared_quicklook() {
        let mut output = output("reject", true, 0);
        let mut short = packet(0, 100);
        short.bytes_mut()[5] = 0;
        short.bytes_mut()[QUICKLOOK_BYTE] |= QUICKLOOK_MASK;
        output.accept(&short);

        let mut flagged = packet(1, 200);
        flagged.bytes_mut()[QUICKLOOK_BYTE] |= QUICKLOOK_MASK;
        let mut cleared = packet(2, 300);
        cleared.bytes_mut()[QUICKLOOK_BYTE] &= !QUICKLOOK_MASK;
        output.accept(&flagged);
        output.accept(&cleared);

        let status = ComponentStatus::of(&output);
        assert_eq!(status.get("length_rejects"), Some(1));
        assert_eq!(status.get("quicklook_rejects"), Some(1));
        assert_eq!(status.get("written_packets"), Some(1));
        let _ = std::fs::remove_dir_all(output.directory());
    }

    #[test]
    fn rotation_waits_for_later_packet_time() {
        let mut output = output("rotate", false, 80);
        // Two packets fill the file; the third repeats the last time
        for (sequence, millis) in [(0u16, 100u32), (1, 200), (2, 200), (3, 300)] {
            output.accept(&packet(sequence, millis));
        }
        let record = output.flush().unwrap().unwrap();
        assert_eq!(record.files.len(), 2);
        assert_eq!(record.files[0].appids[0].stop, CdsTime::from_parts(24_000, 200, 0));
        assert_eq!(record.files[1].appids[0].start, CdsTime::from_parts(24_000, 300, 0));
        let _ = std::fs::remove_dir_all(output.directory());
    }

    #[test]
    fn handle_drops_packets_while_flushing() {
        let mut handle = PdsHandle::new(output("handle", false, 0));
        handle.flushing.store(true, Ordering::Release);
        handle.put_packet(&mut packet(0, 100)).unwrap();
        assert_eq!(handle.dropped_during_flush(), 1);

        handle.flushing.store(false, Ordering::Release);
        handle.put_packet(&mut packet(1, 200)).unwrap();
        let record = handle.finish().unwrap().unwrap();
        assert_eq!(record.total_packets, 1);
        assert!(!handle.is_flushing());
        handle.with_output(|output| std::fs::remove_dir_all(output.directory())).ok();
    }
}
