//! Bitstream (B_PDU) service
//!
//! A B_PDU data zone starts with a 14-bit bitstream data pointer giving the
//! offset of the last valid octet. `0x3FFF` means every octet is valid and
//! `0x3FFE` marks an idle zone.

use tracing::trace;

use crate::frame::{AnyView, BITSTREAM_ALL_VALID, FrameLayout, FrameView};
use crate::routing::FrameReceiver;
use crate::types::{ComponentStatus, Frame, FrameAnnotation, StatusItem, StatusReporter};
use crate::Result;

/// Pointer value for a data zone with no valid bitstream data.
pub const BITSTREAM_IDLE: u16 = 0x3FFE;

/// Consumer of extracted bitstream data.
pub trait BitstreamReceiver: Send {
    fn put_bits(&mut self, data: &[u8], annotation: &FrameAnnotation) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Appends the raw bitstream.
impl BitstreamReceiver for Vec<u8> {
    fn put_bits(&mut self, data: &[u8], _annotation: &FrameAnnotation) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }
}

/// Extracts the valid bitstream octets of each frame.
pub struct BitstreamService<B> {
    layout: FrameLayout,
    output: B,
    frames: u64,
    idle_frames: u64,
    partial_frames: u64,
    bytes: u64,
}

impl<B: BitstreamReceiver> BitstreamService<B> {
    pub fn new(layout: FrameLayout, output: B) -> Self {
        Self { layout, output, frames: 0, idle_frames: 0, partial_frames: 0, bytes: 0 }
    }

    pub fn output(&self) -> &B {
        &self.output
    }
}

impl<B: BitstreamReceiver> FrameReceiver for BitstreamService<B> {
    fn put_frame(&mut self, frame: &mut Frame) -> Result<()> {
        if frame.is_deleted() {
            return Ok(());
        }
        self.frames += 1;

        let view = AnyView::new(&self.layout, &*frame);
        let zone = view.data_zone();
        let valid = match view.bitstream_pointer() {
            BITSTREAM_ALL_VALID => zone,
            BITSTREAM_IDLE => {
                self.idle_frames += 1;
                return Ok(());
            }
            last => {
                self.partial_frames += 1;
                let end = (last as usize + 1).min(zone.len());
                trace!("Bitstream zone valid through octet {}", last);
                &zone[..end]
            }
        };
        self.bytes += valid.len() as u64;
        self.output.put_bits(valid, &frame.annotation)
    }

    fn flush(&mut self) -> Result<()> {
        self.output.flush()
    }

    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        out.push(ComponentStatus::of(self));
    }
}

impl<B> StatusReporter for BitstreamService<B> {
    fn status_name(&self) -> String {
        "bitstream".to_string()
    }

    fn status(&self) -> Vec<StatusItem> {
        vec![
            StatusItem::new("frames", self.frames),
            StatusItem::new("idle_frames", self.idle_frames),
            StatusItem::new("partial_frames", self.partial_frames),
            StatusItem::new("bytes", self.bytes),
        ]
    }
}
