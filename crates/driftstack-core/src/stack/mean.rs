use crate::error::{DriftError, Result};
use crate::frame::{Channel, Image};

/// Running per-sample sum of aligned frames.
///
/// Frames are added one at a time so a sequence never has to be resident at
/// once.
pub struct MeanAccumulator {
    sum: Option<Image>,
    count: usize,
}

impl MeanAccumulator {
    pub fn new() -> Self {
        Self { sum: None, count: 0 }
    }

    /// Start with a zeroed in-memory sum of a known shape.
    pub fn with_shape(width: usize, height: usize, channels: &[Channel]) -> Self {
        Self {
            sum: Some(Image::new(width, height, channels)),
            count: 0,
        }
    }

    /// Start with a zeroed sum held in memory-mapped scratch files, so adding
    /// and finishing never copy a full frame into RAM.
    pub fn out_of_core(width: usize, height: usize, channels: &[Channel]) -> Result<Self> {
        Ok(Self {
            sum: Some(Image::new_out_of_core(width, height, channels)?),
            count: 0,
        })
    }

    /// Add one frame. Every frame must match the first in size and channels.
    pub fn add(&mut self, frame: &Image) -> Result<()> {
        match &mut self.sum {
            Some(sum) => sum.accumulate(frame)?,
            None => self.sum = Some(frame.to_memory()),
        }
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_out_of_core(&self) -> bool {
        self.sum.as_ref().is_some_and(Image::is_out_of_core)
    }

    /// The mean of all frames added so far, in the storage of the sum.
    pub fn finish(self) -> Result<Image> {
        match self.sum {
            Some(mut sum) if self.count > 0 => {
                sum /= self.count as f32;
                Ok(sum)
            }
            _ => Err(DriftError::EmptySequence),
        }
    }
}

impl Default for MeanAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Stack frames by computing the mean at each sample.
pub fn mean_stack(frames: &[Image]) -> Result<Image> {
    let mut acc = MeanAccumulator::new();
    for frame in frames {
        acc.add(frame)?;
    }
    acc.finish()
}
