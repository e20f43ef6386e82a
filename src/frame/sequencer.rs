//! Frame counter checking for one virtual channel stream

use tracing::debug;

use super::layout::FrameLayout;
use super::view::{AnyView, FrameView};
use crate::routing::FrameReceiver;
use crate::sequence::{SequenceCheck, Sequencer};
use crate::types::{ComponentStatus, Frame, StatusItem, StatusReporter};
use crate::Result;

/// Checks the VCDU frame counter and sets the sequence-error quality bit on
/// every frame that does not follow its predecessor.
///
/// Instantiate one per virtual channel: counters of different channels are
/// independent. Downstream, the path service reads the bit to drop any
/// packet fragment it was holding.
pub struct FrameSequencer<R> {
    layout: FrameLayout,
    sequencer: Sequencer,
    next: R,
    frames: u64,
}

/// CADU streams use the plain 24-bit counter.
pub type CaduSequencer<R> = FrameSequencer<R>;

impl<R: FrameReceiver> FrameSequencer<R> {
    pub fn new(layout: FrameLayout, next: R) -> Self {
        Self { layout, sequencer: Sequencer::for_frames(), next, frames: 0 }
    }

    pub fn get_ref(&self) -> &R {
        &self.next
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.next
    }
}

impl<R: FrameReceiver> FrameReceiver for FrameSequencer<R> {
    fn put_frame(&mut self, frame: &mut Frame) -> Result<()> {
        if frame.is_deleted() {
            return self.next.put_frame(frame);
        }

        let (count, bits) = {
            let view = AnyView::new(&self.layout, &*frame);
            (view.sequence_count(), view.sequence_bits())
        };
        if bits != self.sequencer_bits() {
            // AOS cycle usage switched; restart counting at the new width
            self.sequencer = Sequencer::new(bits);
        }

        self.frames += 1;
        let check = self.sequencer.check(count);
        if check.is_error() {
            frame.annotation.set_sequence_error(true);
            match check {
                SequenceCheck::Gap { expected, missing } => {
                    debug!("Frame sequence gap: expected {}, got {} ({} missing)", expected, count, missing)
                }
                SequenceCheck::OutOfOrder { expected, actual } => {
                    debug!("Frame out of order: expected {}, got {}", expected, actual)
                }
                _ => {}
            }
        }
        self.next.put_frame(frame)
    }

    fn flush(&mut self) -> Result<()> {
        self.sequencer.reset();
        self.next.flush()
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        out.push(ComponentStatus::of(self));
        self.next.report_status(out);
    }
}

impl<R> FrameSequencer<R> {
    fn sequencer_bits(&self) -> u32 {
        self.sequencer.bits()
    }
}

impl<R> StatusReporter for FrameSequencer<R> {
    fn status_name(&self) -> String {
        "frame_sequence".to_string()
    }

    fn status(&self) -> Vec<StatusItem> {
        vec![
            StatusItem::new("frames", self.frames),
            StatusItem::new("sequence_errors", self.sequencer.errors()),
            StatusItem::new("missing_frames", self.sequencer.missing()),
        ]
    }
}
