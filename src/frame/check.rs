//! Frame error-control stages
//!
//! [`CrcCheck`] verifies the frame error control field and
//! [`ReedSolomonStage`] hands the codeblock to a pluggable decoder. Both only
//! annotate by default; deletion of bad frames is opt-in.

use tracing::{debug, trace};

use super::layout::{CRC_LENGTH, FrameLayout};
use crate::routing::FrameReceiver;
use crate::types::{ComponentStatus, Frame, StatusItem, StatusReporter};
use crate::Result;

/// CRC-16/CCITT-FALSE (polynomial 0x1021, init 0xFFFF), the CCSDS frame
/// error control field.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Verifies the frame CRC and sets the CRC-error quality bit on mismatch.
pub struct CrcCheck<R> {
    layout: FrameLayout,
    delete_errors: bool,
    next: R,
    checked: u64,
    errors: u64,
}

impl<R: FrameReceiver> CrcCheck<R> {
    /// Frames without a CRC in their layout pass through unchecked.
    pub fn new(layout: FrameLayout, delete_errors: bool, next: R) -> Self {
        Self { layout, delete_errors, next, checked: 0, errors: 0 }
    }

    fn crc_matches(&self, bytes: &[u8]) -> Option<bool> {
        let coverage = self.layout.crc_coverage()?;
        let crc_start = coverage.end;
        let stored = bytes.get(crc_start..crc_start + CRC_LENGTH)?;
        let computed = crc16_ccitt(bytes.get(coverage)?);
        Some(computed.to_be_bytes() == stored)
    }

    pub fn into_inner(self) -> R {
        self.next
    }
}

impl<R: FrameReceiver> FrameReceiver for CrcCheck<R> {
    fn put_frame(&mut self, frame: &mut Frame) -> Result<()> {
        if !frame.is_deleted() {
            if let Some(ok) = self.crc_matches(frame.bytes()) {
                self.checked += 1;
                if !ok {
                    self.errors += 1;
                    frame.annotation.set_crc_error(true);
                    trace!("CRC mismatch on frame {}", self.checked);
                    if self.delete_errors {
                        frame.delete();
                    }
                }
            }
        }
        self.next.put_frame(frame)
    }

    fn flush(&mut self) -> Result<()> {
        self.next.flush()
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        out.push(ComponentStatus::of(self));
        self.next.report_status(out);
    }
}

impl<R> StatusReporter for CrcCheck<R> {
    fn status_name(&self) -> String {
        "crc".to_string()
    }

    fn status(&self) -> Vec<StatusItem> {
        vec![StatusItem::new("frames_checked", self.checked), StatusItem::new("crc_errors", self.errors)]
    }
}

/// Result of decoding one codeblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsOutcome {
    Clean,
    /// Symbols were corrected in place
    Corrected(usize),
    Uncorrectable,
}

/// Reed-Solomon decoder hook. Implementations correct `codeblock` (VCDU
/// header through parity) in place.
pub trait ReedSolomonDecoder: Send {
    fn decode(&mut self, codeblock: &mut [u8], parity_length: usize) -> RsOutcome;
}

/// Decoder for streams already corrected upstream: reports every block clean.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughDecoder;

impl ReedSolomonDecoder for PassThroughDecoder {
    fn decode(&mut self, _codeblock: &mut [u8], _parity_length: usize) -> RsOutcome {
        RsOutcome::Clean
    }
}

/// Runs a [`ReedSolomonDecoder`] over each frame and records the outcome in
/// the quality bits.
pub struct ReedSolomonStage<R, D> {
    layout: FrameLayout,
    decoder: D,
    delete_uncorrectable: bool,
    next: R,
    corrected: u64,
    uncorrectable: u64,
}

impl<R: FrameReceiver, D: ReedSolomonDecoder> ReedSolomonStage<R, D> {
    pub fn new(layout: FrameLayout, decoder: D, delete_uncorrectable: bool, next: R) -> Self {
        Self { layout, decoder, delete_uncorrectable, next, corrected: 0, uncorrectable: 0 }
    }
}

impl<R: FrameReceiver, D: ReedSolomonDecoder> FrameReceiver for ReedSolomonStage<R, D> {
    fn put_frame(&mut self, frame: &mut Frame) -> Result<()> {
        let parity = self.layout.rs_parity_length();
        if !frame.is_deleted() && parity > 0 {
            let codeblock = self.layout.codeblock();
            let outcome = match frame.bytes_mut().get_mut(codeblock) {
                Some(block) => self.decoder.decode(block, parity),
                None => RsOutcome::Uncorrectable,
            };
            match outcome {
                RsOutcome::Clean => {}
                RsOutcome::Corrected(symbols) => {
                    self.corrected += 1;
                    frame.annotation.set_rs_corrected(true);
                    trace!("Reed-Solomon corrected {} symbols", symbols);
                }
                RsOutcome::Uncorrectable => {
                    self.uncorrectable += 1;
                    frame.annotation.set_rs_uncorrectable(true);
                    debug!("Reed-Solomon uncorrectable frame ({} so far)", self.uncorrectable);
                    if self.delete_uncorrectable {
                        frame.delete();
                    }
                }
            }
        }
        self.next.put_frame(frame)
    }

    fn flush(&mut self) -> Result<()> {
        self.next.flush()
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        out.push(ComponentStatus::of(self));
        self.next.report_status(out);
    }
}

impl<R, D> StatusReporter for ReedSolomonStage<R, D> {
    fn status_name(&self) -> String {
        "reed_solomon".to_string()
    }

    fn status(&self) -> Vec<StatusItem> {
        vec![
            StatusItem::new("rs_corrected", self.corrected),
            StatusItem::new("rs_uncorrectable", self.uncorrectable),
        ]
    }
}
