//! Sequence counter checkers
//!
//! [`Sequencer`] is the one-step checker shared by the frame level (24-bit
//! VCDU counter) and the packet level (14-bit source sequence count).
//! [`StepSequencer`] generalizes it to signed, non-unit steps for datasets
//! whose instruments count by more than one.

use serde::{Deserialize, Serialize};

use crate::types::count_after;

/// Width of the VCDU frame counter.
pub const FRAME_COUNTER_BITS: u32 = 24;
/// Width of the packet source sequence count.
pub const PACKET_COUNTER_BITS: u32 = 14;

/// Outcome of checking one counter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceCheck {
    /// First value seen; the checker seeded itself from it
    Seeded,
    /// Value matched the expected count
    InOrder,
    /// Value skipped ahead of the expected count
    Gap { expected: u32, missing: u32 },
    /// Value repeated or went backwards; the checker resynchronized
    OutOfOrder { expected: u32, actual: u32 },
}

impl SequenceCheck {
    pub fn is_error(self) -> bool {
        matches!(self, SequenceCheck::Gap { .. } | SequenceCheck::OutOfOrder { .. })
    }
}

/// One-step modular sequence checker.
#[derive(Debug, Clone)]
pub struct Sequencer {
    bits: u32,
    mask: u32,
    expected: Option<u32>,
    errors: u64,
    missing: u64,
}

impl Sequencer {
    pub fn new(bits: u32) -> Self {
        Self { bits, mask: (1u32 << bits) - 1, expected: None, errors: 0, missing: 0 }
    }

    pub fn for_frames() -> Self {
        Self::new(FRAME_COUNTER_BITS)
    }

    pub fn for_packets() -> Self {
        Self::new(PACKET_COUNTER_BITS)
    }

    /// Check `actual` and advance to `actual + 1`.
    ///
    /// A value less than half the counter range ahead of the expected one is a
    /// gap. Anything further is indistinguishable from a step backwards, so it
    /// counts as an error without adding to [`missing`](Self::missing).
    pub fn check(&mut self, actual: u32) -> SequenceCheck {
        let actual = actual & self.mask;
        let next = (actual + 1) & self.mask;
        let result = match self.expected {
            None => SequenceCheck::Seeded,
            Some(expected) if expected == actual => SequenceCheck::InOrder,
            Some(expected) => {
                self.errors += 1;
                if count_after(actual, expected, self.bits) {
                    let missing = actual.wrapping_sub(expected) & self.mask;
                    self.missing += missing as u64;
                    SequenceCheck::Gap { expected, missing }
                } else {
                    SequenceCheck::OutOfOrder { expected, actual }
                }
            }
        };
        self.expected = Some(next);
        result
    }

    pub fn expected(&self) -> Option<u32> {
        self.expected
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn missing(&self) -> u64 {
        self.missing
    }

    /// Forget the expected value; the next count seeds again.
    pub fn reset(&mut self) {
        self.expected = None;
    }
}

/// Sequence checker for a configurable signed step.
///
/// With step `s` the expected successor of `c` is `(c + s) mod 2^bits`. When a
/// value skips ahead, the number of missing counts is the number of step
/// positions strictly between the previous and the current value. Values that
/// repeat or lie in the back half of the range, measured in the direction of
/// the step, are out of order rather than a gap.
#[derive(Debug, Clone)]
pub struct StepSequencer {
    modulus: i64,
    step: i64,
    last: Option<u32>,
}

impl StepSequencer {
    /// `step` must be non-zero and smaller in magnitude than the counter
    /// range; callers validate this at configuration time.
    pub fn new(bits: u32, step: i32) -> Self {
        Self { modulus: 1i64 << bits, step: step as i64, last: None }
    }

    pub fn expected(&self) -> Option<u32> {
        self.last.map(|last| (last as i64 + self.step).rem_euclid(self.modulus) as u32)
    }

    pub fn check(&mut self, actual: u32) -> SequenceCheck {
        let actual = (actual as i64).rem_euclid(self.modulus);
        let result = match (self.last, self.expected()) {
            (None, _) | (_, None) => SequenceCheck::Seeded,
            (Some(_), Some(expected)) if expected as i64 == actual => SequenceCheck::InOrder,
            (Some(last), Some(expected)) => {
                let magnitude = self.step.abs();
                // Distance travelled in the direction of the step
                let distance = if self.step > 0 {
                    (actual - last as i64).rem_euclid(self.modulus)
                } else {
                    (last as i64 - actual).rem_euclid(self.modulus)
                };
                // Anything in the back half of the range went the wrong way
                if distance == 0 || distance >= self.modulus / 2 {
                    SequenceCheck::OutOfOrder { expected, actual: actual as u32 }
                } else {
                    let missing = (distance + magnitude - 1) / magnitude - 1;
                    SequenceCheck::Gap { expected, missing: missing as u32 }
                }
            }
        };
        self.last = Some(actual as u32);
        result
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn gap_reports_expected_and_missing() {
        let mut sequencer = Sequencer::for_packets();
        assert_eq!(sequencer.check(0), SequenceCheck::Seeded);
        assert_eq!(sequencer.check(1), SequenceCheck::InOrder);
        assert_eq!(sequencer.check(3), SequenceCheck::Gap { expected: 2, missing: 1 });
        assert_eq!(sequencer.check(4), SequenceCheck::InOrder);
        assert_eq!(sequencer.errors(), 1);
        assert_eq!(sequencer.missing(), 1);
    }

    #[test]
    fn frame_counter_wraps_at_24_bits() {
        let mut sequencer = Sequencer::for_frames();
        sequencer.check(0xFF_FFFE);
        assert_eq!(sequencer.check(0xFF_FFFF), SequenceCheck::InOrder);
        assert_eq!(sequencer.check(0), SequenceCheck::InOrder);
        assert_eq!(sequencer.check(3), SequenceCheck::Gap { expected: 1, missing: 2 });
    }

    #[test]
    fn repeat_is_out_of_order() {
        let mut sequencer = Sequencer::for_packets();
        sequencer.check(10);
        assert_eq!(sequencer.check(10), SequenceCheck::OutOfOrder { expected: 11, actual: 10 });
        assert_eq!(sequencer.check(11), SequenceCheck::InOrder);
    }

    #[test]
    fn reset_seeds_again() {
        let mut sequencer = Sequencer::for_packets();
        sequencer.check(10);
        sequencer.reset();
        assert_eq!(sequencer.check(500), SequenceCheck::Seeded);
    }

    #[test]
    fn step_sequencer_counts_missing_positions() {
        let mut sequencer = StepSequencer::new(14, 2);
        sequencer.check(0);
        assert_eq!(sequencer.check(2), SequenceCheck::InOrder);
        // 4 and 6 missing
        assert_eq!(sequencer.check(8), SequenceCheck::Gap { expected: 4, missing: 2 });
        // Off-step value: 10 missing, 11 lands between positions
        assert_eq!(sequencer.check(11), SequenceCheck::Gap { expected: 10, missing: 1 });
    }

    #[test]
    fn negative_step_wraps_downward() {
        let mut sequencer = StepSequencer::new(14, -1);
        sequencer.check(1);
        assert_eq!(sequencer.check(0), SequenceCheck::InOrder);
        assert_eq!(sequencer.check(0x3FFF), SequenceCheck::InOrder);
        assert_eq!(sequencer.check(0x3FFC), SequenceCheck::Gap { expected: 0x3FFE, missing: 2 });
    }

    #[test]
    fn jump_past_half_range_is_not_counted_as_missing() {
        let mut sequencer = Sequencer::for_packets();
        sequencer.check(0);
        assert_eq!(sequencer.check(9000), SequenceCheck::OutOfOrder { expected: 1, actual: 9000 });
        assert_eq!(sequencer.errors(), 1);
        assert_eq!(sequencer.missing(), 0);
        assert_eq!(sequencer.check(9001), SequenceCheck::InOrder);
    }

    #[test]
    fn step_sequencer_backwards_value_is_out_of_order() {
        let mut sequencer = StepSequencer::new(14, 1);
        sequencer.check(10);
        assert_eq!(sequencer.check(9), SequenceCheck::OutOfOrder { expected: 11, actual: 9 });
        assert_eq!(sequencer.check(10), SequenceCheck::InOrder);
        assert_eq!(sequencer.check(10), SequenceCheck::OutOfOrder { expected: 11, actual: 10 });
    }

    #[test]
    fn negative_step_rising_value_is_out_of_order() {
        let mut sequencer = StepSequencer::new(14, -2);
        sequencer.check(100);
        assert_eq!(sequencer.check(104), SequenceCheck::OutOfOrder { expected: 98, actual: 104 });
        // Wrapping downward past zero is still a forward gap
        sequencer.check(2);
        assert_eq!(sequencer.check(0x3FFC), SequenceCheck::Gap { expected: 0, missing: 2 });
    }

    proptest! {
        #[test]
        fn prop_unit_step_matches_one_step_sequencer(
            start in 0u32..0x4000,
            jumps in prop::collection::vec(1u32..40, 1..30),
        ) {
            let mut one = Sequencer::for_packets();
            let mut step = StepSequencer::new(14, 1);
            let mut count = start;
            one.check(count);
            step.check(count);
            for jump in jumps {
                count = (count + jump) & 0x3FFF;
                prop_assert_eq!(one.check(count), step.check(count));
            }
        }

        #[test]
        fn prop_in_order_stream_has_no_errors(start in 0u32..0x100_0000, len in 1usize..500) {
            let mut sequencer = Sequencer::for_frames();
            for i in 0..len as u32 {
                prop_assert!(!sequencer.check((start + i) & 0xFF_FFFF).is_error());
            }
            prop_assert_eq!(sequencer.errors(), 0);
        }
    }
}
