//! Output channels
//!
//! [`AnnotatedWriter`] streams frames, packets or bitstream chunks to any
//! [`Write`] sink, each unit prefixed by its annotation words:
//!
//! ```text
//! [frame annotation: 8 bytes] [packet annotation: 4 bytes] [data]
//! ```
//!
//! Frames and bitstream chunks carry a zero packet annotation. Write failures
//! never stop the pipeline: after [`DEFAULT_MAX_CONSECUTIVE_IO_ERRORS`] in a
//! row the channel stops writing and discards everything it is handed.

use std::io::{self, BufWriter, Write};
use tracing::{debug, warn};

use crate::config::DEFAULT_MAX_CONSECUTIVE_IO_ERRORS;
use crate::routing::{BitstreamReceiver, FrameReceiver, PacketReceiver};
use crate::types::{ComponentStatus, Frame, FrameAnnotation, Packet, StatusItem, StatusReporter};
use crate::Result;

/// Counts consecutive write failures and trips after a limit.
#[derive(Debug, Clone)]
pub struct ErrorGate {
    limit: u32,
    consecutive: u32,
    total: u64,
    tripped: bool,
}

impl ErrorGate {
    pub fn new(limit: u32) -> Self {
        Self { limit: limit.max(1), consecutive: 0, total: 0, tripped: false }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Record the outcome of one write. Returns true on the failure that
    /// trips the gate.
    pub fn record(&mut self, channel: &str, outcome: &io::Result<()>) -> bool {
        match outcome {
            Ok(()) => {
                self.consecutive = 0;
                false
            }
            Err(error) => {
                self.consecutive += 1;
                self.total += 1;
                warn!("Write to {} failed ({} in a row): {}", channel, self.consecutive, error);
                if self.consecutive >= self.limit && !self.tripped {
                    self.tripped = true;
                    warn!("Output channel {} disabled after {} consecutive errors", channel, self.consecutive);
                    return true;
                }
                false
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.tripped = false;
    }
}

/// Annotated unit writer over any byte sink.
pub struct AnnotatedWriter<W: Write> {
    name: String,
    sink: BufWriter<W>,
    gate: ErrorGate,
    units: u64,
    bytes: u64,
    discarded: u64,
}

impl<W: Write> AnnotatedWriter<W> {
    pub fn new(name: impl Into<String>, sink: W) -> Self {
        Self::with_error_limit(name, sink, DEFAULT_MAX_CONSECUTIVE_IO_ERRORS)
    }

    pub fn with_error_limit(name: impl Into<String>, sink: W, limit: u32) -> Self {
        Self {
            name: name.into(),
            sink: BufWriter::new(sink),
            gate: ErrorGate::new(limit),
            units: 0,
            bytes: 0,
            discarded: 0,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.gate.is_tripped()
    }

    pub fn get_ref(&self) -> &W {
        self.sink.get_ref()
    }

    /// Flush and return the sink.
    pub fn into_inner(self) -> io::Result<W> {
        self.sink.into_inner().map_err(|error| error.into_error())
    }

    fn write_unit(&mut self, frame: &FrameAnnotation, packet_word: u32, data: &[u8]) {
        if self.gate.is_tripped() {
            self.discarded += 1;
            return;
        }
        let outcome = self
            .sink
            .write_all(&frame.to_bytes())
            .and_then(|()| self.sink.write_all(&packet_word.to_be_bytes()))
            .and_then(|()| self.sink.write_all(data));
        if outcome.is_ok() {
            self.units += 1;
            self.bytes += data.len() as u64;
        } else {
            self.discarded += 1;
        }
        self.gate.record(&self.name, &outcome);
    }

    fn flush_sink(&mut self) {
        if self.gate.is_tripped() {
            return;
        }
        let outcome = self.sink.flush();
        self.gate.record(&self.name, &outcome);
        debug!("Flushed output channel {} after {} units", self.name, self.units);
    }
}

impl<W: Write + Send> FrameReceiver for AnnotatedWriter<W> {
    fn put_frame(&mut self, frame: &mut Frame) -> Result<()> {
        if !frame.is_deleted() {
            self.write_unit(&frame.annotation, 0, frame.bytes());
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_sink();
        Ok(())
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        out.push(ComponentStatus::of(self));
    }
}

impl<W: Write + Send> PacketReceiver for AnnotatedWriter<W> {
    fn put_packet(&mut self, packet: &mut Packet) -> Result<()> {
        if !packet.is_deleted() {
            self.write_unit(&packet.frame_annotation, packet.annotation.to_word(), packet.bytes());
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_sink();
        Ok(())
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        out.push(ComponentStatus::of(self));
    }
}

impl<W: Write + Send> BitstreamReceiver for AnnotatedWriter<W> {
    fn put_bits(&mut self, data: &[u8], annotation: &FrameAnnotation) -> Result<()> {
        self.write_unit(annotation, 0, data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_sink();
        Ok(())
    }
}

impl<W: Write> StatusReporter for AnnotatedWriter<W> {
    fn status_name(&self) -> String {
        self.name.clone()
    }

    fn status(&self) -> Vec<StatusItem> {
        vec![
            StatusItem::new("units", self.units),
            StatusItem::new("bytes", self.bytes),
            StatusItem::new("io_errors", self.gate.total()),
            StatusItem::new("discarded", self.discarded),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::packet_bytes;

    struct BrokenPipe {
        attempts: usize,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            self.attempts += 1;
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn packet_unit_layout() {
        let mut writer = AnnotatedWriter::new("packets", Vec::new());
        let mut packet = Packet::from_bytes(&packet_bytes(5, 1, 10)).unwrap();
        packet.annotation.has_fill = true;
        packet.annotation.good_byte_count = 8;
        writer.put_packet(&mut packet).unwrap();

        let out = writer.into_inner().unwrap();
        assert_eq!(out.len(), 8 + 4 + 10);
        assert_eq!(&out[8..12], &packet.annotation.to_word().to_be_bytes());
        assert_eq!(&out[12..], packet.bytes());
    }

    #[test]
    fn disables_after_consecutive_errors() {
        // No buffering so every unit reaches the sink
        let mut writer = AnnotatedWriter::with_error_limit("sink", BrokenPipe { attempts: 0 }, 3);
        writer.sink = BufWriter::with_capacity(0, BrokenPipe { attempts: 0 });
        for sequence in 0..6u16 {
            let mut packet = Packet::from_bytes(&packet_bytes(5, sequence, 10)).unwrap();
            writer.put_packet(&mut packet).unwrap();
        }
        assert!(writer.is_disabled());
        assert_eq!(writer.get_ref().attempts, 3);
        let status = ComponentStatus::of(&writer);
        assert_eq!(status.get("io_errors"), Some(3));
        assert_eq!(status.get("discarded"), Some(6));
    }

    #[test]
    fn success_resets_the_run() {
        let mut gate = ErrorGate::new(2);
        let failure: io::Result<()> = Err(io::Error::other("full"));
        assert!(!gate.record("x", &failure));
        gate.record("x", &Ok(()));
        assert!(!gate.record("x", &failure));
        assert!(gate.record("x", &failure));
        assert!(gate.is_tripped());
        assert_eq!(gate.total(), 3);
    }
}
