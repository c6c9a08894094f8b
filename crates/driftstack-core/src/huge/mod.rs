//! Out-of-core float storage.
//!
//! [`HugeFloatArray`] backs a multi-dimensional `f32` array with one or more
//! memory-mapped scratch files. Each segment is an anonymous temp file, so the
//! backing storage disappears when the array is dropped or the process exits.

mod layout;

pub use layout::SegmentLayout;

use std::fs::File;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use memmap2::MmapMut;

use crate::consts::DEFAULT_SEGMENT_ELEMENTS;
use crate::error::Result;

const BYTES_PER_ELEMENT: usize = std::mem::size_of::<f32>();

/// Flat `f32` array of 2 to 4 dimensions backed by memory-mapped segments.
///
/// Reads through `&self` may happen from several threads; writes need
/// `&mut self`, so concurrent mutation requires external locking.
pub struct HugeFloatArray {
    layout: SegmentLayout,
    segments: Vec<MmapMut>,
}

impl HugeFloatArray {
    /// Create a zero-filled array in the system temp directory.
    pub fn new(dims: &[usize]) -> Result<Self> {
        Self::with_segment_limit(dims, DEFAULT_SEGMENT_ELEMENTS)
    }

    /// Create a zero-filled array whose segments hold at most
    /// `max_segment_len` elements.
    pub fn with_segment_limit(dims: &[usize], max_segment_len: u64) -> Result<Self> {
        let layout = SegmentLayout::new(dims, max_segment_len)?;
        Self::create(layout, tempfile::tempfile)
    }

    /// Like [`with_segment_limit`](Self::with_segment_limit) but places the
    /// scratch files in `dir`.
    pub fn new_in(dir: &Path, dims: &[usize], max_segment_len: u64) -> Result<Self> {
        let layout = SegmentLayout::new(dims, max_segment_len)?;
        Self::create(layout, || tempfile::tempfile_in(dir))
    }

    fn create(
        layout: SegmentLayout,
        open: impl Fn() -> std::io::Result<File>,
    ) -> Result<Self> {
        let segment_bytes = layout.segment_len() * BYTES_PER_ELEMENT as u64;
        let mut segments = Vec::with_capacity(layout.segment_count());
        for _ in 0..layout.segment_count() {
            let file = open()?;
            file.set_len(segment_bytes)?;
            // SAFETY: the file is an unlinked temp file owned by this array,
            // so no other process can resize or write it.
            let mmap = unsafe { MmapMut::map_mut(&file)? };
            segments.push(mmap);
        }
        Ok(Self { layout, segments })
    }

    pub fn dims(&self) -> &[usize] {
        self.layout.dims()
    }

    pub fn len(&self) -> u64 {
        self.layout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.layout.segment_count()
    }

    pub fn segment_len(&self) -> u64 {
        self.layout.segment_len()
    }

    pub fn get(&self, coords: &[usize]) -> Result<f32> {
        let flat = self.layout.flat_index(coords)?;
        Ok(self.get_flat(flat))
    }

    pub fn set(&mut self, coords: &[usize], value: f32) -> Result<()> {
        let flat = self.layout.flat_index(coords)?;
        self.set_flat(flat, value);
        Ok(())
    }

    /// Read by flat index. Panics if `flat >= len()`.
    pub fn get_flat(&self, flat: u64) -> f32 {
        assert!(flat < self.len(), "flat index {flat} out of range");
        let (segment, offset) = self.layout.locate(flat);
        let start = offset * BYTES_PER_ELEMENT;
        LittleEndian::read_f32(&self.segments[segment][start..start + BYTES_PER_ELEMENT])
    }

    /// Write by flat index. Panics if `flat >= len()`.
    pub fn set_flat(&mut self, flat: u64, value: f32) {
        assert!(flat < self.len(), "flat index {flat} out of range");
        let (segment, offset) = self.layout.locate(flat);
        let start = offset * BYTES_PER_ELEMENT;
        LittleEndian::write_f32(
            &mut self.segments[segment][start..start + BYTES_PER_ELEMENT],
            value,
        );
    }
}

impl std::fmt::Debug for HugeFloatArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HugeFloatArray")
            .field("dims", &self.layout.dims())
            .field("segments", &self.layout.segment_count())
            .field("segment_len", &self.layout.segment_len())
            .finish()
    }
}
