//! Zero-copy header views over a frame
//!
//! A view is two references: the shared [`FrameLayout`] and the frame bytes.
//! Rebinding to the next frame with `set_frame` touches nothing else, so a
//! stage can keep one view and move it along the stream.

use super::layout::{DATA_POINTER_LENGTH, FrameLayout, HeaderField, VCDU_HEADER_LENGTH};
use crate::config::FrameFormat;
use crate::sequence::FRAME_COUNTER_BITS;
use crate::types::Frame;

/// Virtual channel reserved for idle frames.
pub const FILL_VIRTUAL_CHANNEL: u8 = 63;
/// First-header pointer value for a data zone that holds only idle data.
pub const IDLE_VCDU: u16 = 0x7FE;
/// First-header pointer value for a zone continuing an earlier packet.
pub const NO_PACKET_HEADER: u16 = 0x7FF;
/// Bitstream data pointer value meaning the whole zone is valid.
pub const BITSTREAM_ALL_VALID: u16 = 0x3FFF;

/// Header accessors shared by the CADU and AOS interpretations.
pub trait FrameView {
    fn layout(&self) -> &FrameLayout;

    /// Whole frame as delivered.
    fn bytes(&self) -> &[u8];

    /// The 6-byte VCDU primary header, or fewer bytes for a truncated frame.
    fn header(&self) -> &[u8] {
        let start = self.layout().header_start();
        let bytes = self.bytes();
        let end = (start + VCDU_HEADER_LENGTH).min(bytes.len());
        bytes.get(start..end).unwrap_or(&[])
    }

    fn version(&self) -> u8 {
        HeaderField::VERSION.extract(self.header()) as u8
    }

    fn spacecraft(&self) -> u16 {
        HeaderField::SPACECRAFT_ID.extract(self.header()) as u16
    }

    fn virtual_channel(&self) -> u8 {
        HeaderField::VIRTUAL_CHANNEL_ID.extract(self.header()) as u8
    }

    fn vcdu_id(&self) -> u16 {
        HeaderField::VCDU_ID.extract(self.header()) as u16
    }

    fn sequence_count(&self) -> u32 {
        HeaderField::FRAME_COUNT.extract(self.header())
    }

    /// Width of the value returned by [`FrameView::sequence_count`].
    fn sequence_bits(&self) -> u32 {
        FRAME_COUNTER_BITS
    }

    fn is_replay(&self) -> bool {
        HeaderField::REPLAY.extract(self.header()) == 1
    }

    fn is_fill_frame(&self) -> bool {
        self.virtual_channel() == FILL_VIRTUAL_CHANNEL
    }

    /// Raw 16-bit data pointer word at the start of the data zone.
    fn data_pointer_word(&self) -> u16 {
        let start = self.layout().data_zone_start();
        match self.bytes().get(start..start + DATA_POINTER_LENGTH) {
            Some([hi, lo]) => u16::from_be_bytes([*hi, *lo]),
            _ => NO_PACKET_HEADER,
        }
    }

    /// 11-bit first-header pointer (packet service).
    fn first_header_pointer(&self) -> u16 {
        self.data_pointer_word() & 0x07FF
    }

    /// 14-bit bitstream data pointer (bitstream service).
    fn bitstream_pointer(&self) -> u16 {
        self.data_pointer_word() & 0x3FFF
    }

    /// Data bytes after the pointer through the end of the data zone.
    fn data_zone(&self) -> &[u8] {
        let layout = self.layout();
        self.bytes().get(layout.data_start()..=layout.data_zone_end()).unwrap_or(&[])
    }
}

/// CCSDS version-2 CADU view.
#[derive(Debug, Clone, Copy)]
pub struct Cadu<'a> {
    layout: &'a FrameLayout,
    bytes: &'a [u8],
}

impl<'a> Cadu<'a> {
    pub fn new(layout: &'a FrameLayout, frame: &'a Frame) -> Self {
        Self { layout, bytes: frame.bytes() }
    }

    pub fn set_frame(&mut self, frame: &'a Frame) {
        self.bytes = frame.bytes();
    }
}

impl FrameView for Cadu<'_> {
    fn layout(&self) -> &FrameLayout {
        self.layout
    }

    fn bytes(&self) -> &[u8] {
        self.bytes
    }
}

/// AOS transfer frame view.
///
/// Field positions come from the same [`HeaderField`] table as [`Cadu`]. The
/// signaling field adds a frame-count cycle which, when the usage flag is
/// set, extends the counter to 28 bits.
#[derive(Debug, Clone, Copy)]
pub struct Aos<'a> {
    layout: &'a FrameLayout,
    bytes: &'a [u8],
}

impl<'a> Aos<'a> {
    pub fn new(layout: &'a FrameLayout, frame: &'a Frame) -> Self {
        Self { layout, bytes: frame.bytes() }
    }

    pub fn set_frame(&mut self, frame: &'a Frame) {
        self.bytes = frame.bytes();
    }

    pub fn uses_frame_count_cycle(&self) -> bool {
        HeaderField::FRAME_COUNT_USAGE.extract(self.header()) == 1
    }

    pub fn frame_count_cycle(&self) -> u8 {
        HeaderField::FRAME_COUNT_CYCLE.extract(self.header()) as u8
    }
}

impl FrameView for Aos<'_> {
    fn layout(&self) -> &FrameLayout {
        self.layout
    }

    fn bytes(&self) -> &[u8] {
        self.bytes
    }

    fn sequence_count(&self) -> u32 {
        let count = HeaderField::FRAME_COUNT.extract(self.header());
        if self.uses_frame_count_cycle() {
            ((self.frame_count_cycle() as u32) << FRAME_COUNTER_BITS) | count
        } else {
            count
        }
    }

    fn sequence_bits(&self) -> u32 {
        if self.uses_frame_count_cycle() {
            FRAME_COUNTER_BITS + HeaderField::FRAME_COUNT_CYCLE.bit_length
        } else {
            FRAME_COUNTER_BITS
        }
    }

    /// AOS frames carry no replay flag in the CADU position.
    fn is_replay(&self) -> bool {
        false
    }
}

/// Either view, selected by the layout's format.
#[derive(Debug, Clone, Copy)]
pub enum AnyView<'a> {
    Cadu(Cadu<'a>),
    Aos(Aos<'a>),
}

impl<'a> AnyView<'a> {
    pub fn new(layout: &'a FrameLayout, frame: &'a Frame) -> Self {
        match layout.format() {
            FrameFormat::Cadu => AnyView::Cadu(Cadu::new(layout, frame)),
            FrameFormat::Aos => AnyView::Aos(Aos::new(layout, frame)),
        }
    }

    fn inner(&self) -> &dyn FrameView {
        match self {
            AnyView::Cadu(view) => view,
            AnyView::Aos(view) => view,
        }
    }
}

impl FrameView for AnyView<'_> {
    fn layout(&self) -> &FrameLayout {
        self.inner().layout()
    }

    fn bytes(&self) -> &[u8] {
        self.inner().bytes()
    }

    fn sequence_count(&self) -> u32 {
        self.inner().sequence_count()
    }

    fn sequence_bits(&self) -> u32 {
        self.inner().sequence_bits()
    }

    fn is_replay(&self) -> bool {
        self.inner().is_replay()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrameLayoutConfig;
    use crate::types::FrameAnnotation;

    fn small_layout(format: FrameFormat) -> FrameLayout {
        FrameLayout::new(&FrameLayoutConfig {
            format,
            frame_length: 32,
            rs_parity_length: 0,
            ..FrameLayoutConfig::default()
        })
        .unwrap()
    }

    fn frame_with_header(header: [u8; 6], pointer: u16) -> Frame {
        let mut bytes = vec![0x1A, 0xCF, 0xFC, 0x1D];
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&pointer.to_be_bytes());
        bytes.resize(32, 0x55);
        Frame::new(bytes, FrameAnnotation::default())
    }

    #[test]
    fn cadu_reads_identity_and_pointer() {
        let layout = small_layout(FrameFormat::Cadu);
        // version 1, scid 42, vcid 16, count 7
        let frame = frame_with_header([0x4A, 0x90, 0x00, 0x00, 0x07, 0x00], 0x0012);
        let view = Cadu::new(&layout, &frame);
        assert_eq!(view.version(), 1);
        assert_eq!(view.spacecraft(), 42);
        assert_eq!(view.virtual_channel(), 16);
        assert_eq!(view.sequence_count(), 7);
        assert_eq!(view.first_header_pointer(), 0x12);
        assert_eq!(view.data_zone().len(), 32 - 12);
        assert!(!view.is_fill_frame());
    }

    #[test]
    fn view_rebinds_without_new_layout() {
        let layout = small_layout(FrameFormat::Cadu);
        let first = frame_with_header([0x4A, 0x90, 0, 0, 1, 0], 0);
        let fill = frame_with_header([0x4A, 0xBF, 0, 0, 2, 0], IDLE_VCDU);
        let mut view = Cadu::new(&layout, &first);
        assert_eq!(view.sequence_count(), 1);
        view.set_frame(&fill);
        assert_eq!(view.virtual_channel(), FILL_VIRTUAL_CHANNEL);
        assert!(view.is_fill_frame());
        assert_eq!(view.first_header_pointer(), IDLE_VCDU);
    }

    #[test]
    fn aos_extends_count_with_cycle() {
        let layout = small_layout(FrameFormat::Aos);
        // usage flag set, cycle 0xA, count 0xFFFFFF
        let frame = frame_with_header([0x4A, 0x90, 0xFF, 0xFF, 0xFF, 0x4A], 0);
        let view = AnyView::new(&layout, &frame);
        assert_eq!(view.sequence_bits(), 28);
        assert_eq!(view.sequence_count(), 0xAFF_FFFF);

        let plain = frame_with_header([0x4A, 0x90, 0x00, 0x00, 0x05, 0x0A], 0);
        let view = Aos::new(&layout, &plain);
        assert_eq!(view.sequence_bits(), 24);
        assert_eq!(view.sequence_count(), 5);
    }

    #[test]
    fn truncated_frame_reads_zero_fields() {
        let layout = small_layout(FrameFormat::Cadu);
        let frame = Frame::new(vec![0x1A, 0xCF, 0xFC], FrameAnnotation::default());
        let view = Cadu::new(&layout, &frame);
        assert_eq!(view.spacecraft(), 0);
        assert_eq!(view.first_header_pointer(), NO_PACKET_HEADER);
        assert!(view.data_zone().is_empty());
    }
}
