//! Frame buffer type

use super::FrameAnnotation;

/// One sync-delimited transfer frame.
///
/// The frame owns its buffer until it is handed downstream. `start`/`length`
/// select the frame within a possibly larger synchronizer buffer so that a
/// frame can be re-filled in place without reallocating.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    data: Vec<u8>,
    start: usize,
    length: usize,
    deleted: bool,
    fill_frame: bool,

    /// Quality and receive time
    pub annotation: FrameAnnotation,
}

impl Frame {
    /// Create a frame covering the whole buffer.
    pub fn new(data: Vec<u8>, annotation: FrameAnnotation) -> Self {
        let length = data.len();
        Self { data, start: 0, length, deleted: false, fill_frame: false, annotation }
    }

    /// Create a frame over `data[start..start + length]`. The range is clamped
    /// to the buffer.
    pub fn with_range(data: Vec<u8>, start: usize, length: usize, annotation: FrameAnnotation) -> Self {
        let start = start.min(data.len());
        let length = length.min(data.len() - start);
        Self { data, start, length, deleted: false, fill_frame: false, annotation }
    }

    /// Replace the contents with `bytes`, reusing the existing allocation.
    pub fn refill(&mut self, bytes: &[u8], annotation: FrameAnnotation) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
        self.start = 0;
        self.length = bytes.len();
        self.deleted = false;
        self.fill_frame = false;
        self.annotation = annotation;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[self.start..self.start + self.length]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.start..self.start + self.length]
    }

    pub fn start_offset(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Mark the frame as consumed; later stages skip it.
    pub fn delete(&mut self) {
        self.deleted = true;
    }

    pub fn is_fill_frame(&self) -> bool {
        self.fill_frame
    }

    pub fn set_fill_frame(&mut self, fill: bool) {
        self.fill_frame = fill;
    }
}
