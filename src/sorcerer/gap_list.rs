//! Per-application sequence gap accounting

use tracing::debug;

use super::kernel::PacketKernel;
use crate::sequence::{PACKET_COUNTER_BITS, SequenceCheck, StepSequencer};

/// One run of missing packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    /// Sequence count that was expected next
    pub first_missing: u32,
    /// Dataset offset where the missing packets would have been
    pub byte_offset: u64,
    pub missing: u32,
    /// Last packet before the gap
    pub before: PacketKernel,
    /// First packet after the gap
    pub after: PacketKernel,
}

impl Gap {
    /// Count distance between the packets bracketing the gap.
    pub fn span(&self) -> u32 {
        (self.after.sequence.wrapping_sub(self.before.sequence) as u32) & ((1 << PACKET_COUNTER_BITS) - 1)
    }
}

/// Records every gap in one application's 14-bit sequence.
#[derive(Debug, Clone)]
pub struct GapList {
    sequencer: StepSequencer,
    previous: Option<PacketKernel>,
    gaps: Vec<Gap>,
    out_of_order: u64,
}

impl GapList {
    pub fn new(step: i32) -> Self {
        Self {
            sequencer: StepSequencer::new(PACKET_COUNTER_BITS, step),
            previous: None,
            gaps: Vec::new(),
            out_of_order: 0,
        }
    }

    /// Check the next packet and return the gap it closes, if any.
    pub fn check(&mut self, kernel: &PacketKernel) -> Option<&Gap> {
        let result = self.sequencer.check(kernel.sequence as u32);
        let previous = self.previous.replace(*kernel);
        match (result, previous) {
            (SequenceCheck::Gap { expected, missing }, Some(before)) if missing > 0 => {
                debug!("Sequence gap: expected {}, got {} ({} missing)", expected, kernel.sequence, missing);
                self.gaps.push(Gap {
                    first_missing: expected,
                    byte_offset: kernel.byte_offset,
                    missing,
                    before,
                    after: *kernel,
                });
                self.gaps.last()
            }
            (SequenceCheck::OutOfOrder { .. }, _) => {
                self.out_of_order += 1;
                None
            }
            _ => None,
        }
    }

    pub fn gaps(&self) -> &[Gap] {
        &self.gaps
    }

    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn total_missing(&self) -> u64 {
        self.gaps.iter().map(|gap| gap.missing as u64).sum()
    }

    pub fn out_of_order(&self) -> u64 {
        self.out_of_order
    }

    pub fn clear(&mut self) {
        self.sequencer.reset();
        self.previous = None;
        self.gaps.clear();
        self.out_of_order = 0;
    }
}
