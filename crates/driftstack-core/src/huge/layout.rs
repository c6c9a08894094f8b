use crate::error::{DriftError, Result};

/// Shape and segment partition of a flat out-of-core array.
///
/// The flat index is row-major with the first dimension varying fastest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentLayout {
    dims: Vec<usize>,
    strides: Vec<u64>,
    len: u64,
    segment_len: u64,
    segment_count: usize,
}

impl SegmentLayout {
    /// Partition `dims` into the fewest equally sized segments holding at
    /// most `max_segment_len` elements each.
    pub fn new(dims: &[usize], max_segment_len: u64) -> Result<Self> {
        if !(2..=4).contains(&dims.len()) {
            return Err(DriftError::InvalidArgument(format!(
                "expected 2 to 4 dimensions, got {}",
                dims.len()
            )));
        }
        if let Some(d) = dims.iter().find(|&&d| d == 0) {
            return Err(DriftError::InvalidArgument(format!(
                "dimensions must be positive, got {d} in {dims:?}"
            )));
        }
        if max_segment_len == 0 {
            return Err(DriftError::InvalidArgument(
                "segment limit must be positive".into(),
            ));
        }

        let mut strides = Vec::with_capacity(dims.len());
        let mut len: u64 = 1;
        for &d in dims {
            strides.push(len);
            len = len.checked_mul(d as u64).ok_or_else(|| {
                DriftError::InvalidArgument(format!("element count of {dims:?} overflows"))
            })?;
        }

        let segment_count = len.div_ceil(max_segment_len);
        let segment_len = len.div_ceil(segment_count);

        Ok(Self {
            dims: dims.to_vec(),
            strides,
            len,
            segment_len,
            segment_count: segment_count as usize,
        })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn segment_len(&self) -> u64 {
        self.segment_len
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Flat index of a coordinate tuple, checking arity and bounds.
    pub fn flat_index(&self, coords: &[usize]) -> Result<u64> {
        if coords.len() != self.dims.len() {
            return Err(DriftError::InvalidArgument(format!(
                "expected {} coordinates, got {}",
                self.dims.len(),
                coords.len()
            )));
        }
        let mut flat = 0u64;
        for (axis, (&c, &d)) in coords.iter().zip(&self.dims).enumerate() {
            if c >= d {
                return Err(DriftError::InvalidArgument(format!(
                    "coordinate {c} out of range for axis {axis} of size {d}"
                )));
            }
            flat += c as u64 * self.strides[axis];
        }
        Ok(flat)
    }

    /// Split a flat index into `(segment, offset within segment)`.
    pub fn locate(&self, flat: u64) -> (usize, usize) {
        (
            (flat / self.segment_len) as usize,
            (flat % self.segment_len) as usize,
        )
    }
}
