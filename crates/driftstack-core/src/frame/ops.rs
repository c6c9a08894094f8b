use std::ops::{Add, Div, DivAssign, Mul, Sub};

use super::{BoundaryPolicy, Channel, Grid, Image, Storage};
use crate::error::{DriftError, Result};

impl Image {
    /// Check that `other` has the same width, height and channel set.
    pub fn check_compatible(&self, other: &Image) -> Result<()> {
        if self.width != other.width || self.height != other.height {
            return Err(DriftError::DimensionMismatch {
                left_width: self.width,
                left_height: self.height,
                right_width: other.width,
                right_height: other.height,
            });
        }
        if let Some(&missing) = self.channels.iter().find(|&&c| !other.has_channel(c)) {
            return Err(DriftError::MissingChannel(missing));
        }
        if self.channels.len() != other.channels.len() {
            return Err(DriftError::InvalidArgument(format!(
                "channel sets differ: {:?} vs {:?}",
                self.channels, other.channels
            )));
        }
        Ok(())
    }

    /// For each channel of `self`, its index in `other`.
    fn index_map(&self, other: &Image) -> Result<Vec<usize>> {
        self.check_compatible(other)?;
        self.channels
            .iter()
            .map(|&c| other.require_channel(c))
            .collect()
    }

    fn zip_with(&self, other: &Image, f: impl Fn(f32, f32) -> f32) -> Result<Image> {
        let map = self.index_map(other)?;
        let grids = map
            .iter()
            .enumerate()
            .map(|(i, &j)| {
                Grid::from_fn(self.width, self.height, |x, y| {
                    f(self.get_index(x, y, i), other.get_index(x, y, j))
                })
            })
            .collect();
        Ok(self.with_grids(grids))
    }

    /// Apply `f` to every sample, producing a new in-memory image.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Image {
        let grids = (0..self.channels.len())
            .map(|i| Grid::from_fn(self.width, self.height, |x, y| f(self.get_index(x, y, i))))
            .collect();
        self.with_grids(grids)
    }

    fn with_grids(&self, grids: Vec<Grid>) -> Image {
        Image {
            width: self.width,
            height: self.height,
            channels: self.channels.clone(),
            storage: Storage::Memory(grids),
        }
    }

    pub fn add_image(&self, other: &Image) -> Result<Image> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn sub_image(&self, other: &Image) -> Result<Image> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn mul_image(&self, other: &Image) -> Result<Image> {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn div_image(&self, other: &Image) -> Result<Image> {
        self.zip_with(other, |a, b| a / b)
    }

    /// Add `other` into `self` sample by sample, reusing the existing storage.
    pub fn accumulate(&mut self, other: &Image) -> Result<()> {
        let map = self.index_map(other)?;
        if let Storage::Memory(grids) = &mut self.storage {
            for (grid, &j) in grids.iter_mut().zip(&map) {
                match other.grid(other.channels[j]) {
                    Some(src) => *grid.data_mut() += src.data(),
                    None => {
                        for ((y, x), v) in grid.data_mut().indexed_iter_mut() {
                            *v += other.get_index(x, y, j);
                        }
                    }
                }
            }
            return Ok(());
        }

        for (i, &j) in map.iter().enumerate() {
            for y in 0..self.height {
                for x in 0..self.width {
                    let v = self.get_index(x, y, i) + other.get_index(x, y, j);
                    self.set_index(x, y, i, v);
                }
            }
        }
        Ok(())
    }

    /// Mean absolute difference to `other`, averaged over channels.
    ///
    /// With `Some(channel)` only that channel is compared. Both images must
    /// have the same width and height and carry the compared channels.
    pub fn average_error(&self, other: &Image, channel: Option<Channel>) -> Result<f64> {
        if self.width != other.width || self.height != other.height {
            return Err(DriftError::DimensionMismatch {
                left_width: self.width,
                left_height: self.height,
                right_width: other.width,
                right_height: other.height,
            });
        }
        let channels: Vec<Channel> = match channel {
            Some(c) => vec![c],
            None => self.channels.clone(),
        };
        let pairs = channel_pairs(self, other, &channels)?;
        Ok(window_error(self, other, 0, 0, &pairs))
    }

    /// `(self - other) * factor`, for inspecting residuals after alignment.
    pub fn delta(&self, other: &Image, factor: f32) -> Result<Image> {
        self.zip_with(other, |a, b| (a - b) * factor)
    }
}

/// Resolve `channels` to `(index in a, index in b)` pairs.
pub fn channel_pairs(a: &Image, b: &Image, channels: &[Channel]) -> Result<Vec<(usize, usize)>> {
    channels
        .iter()
        .map(|&c| Ok((a.require_channel(c)?, b.require_channel(c)?)))
        .collect()
}

/// Mean absolute difference between the whole of `window` and the equally
/// sized region of `image` whose top-left corner is `(x0, y0)`.
///
/// Samples of `image` outside its bounds read `0.0`. The result is averaged
/// over the channel `pairs`; an empty window or channel list yields `0.0`.
pub fn window_error(window: &Image, image: &Image, x0: i64, y0: i64, pairs: &[(usize, usize)]) -> f64 {
    let n = window.width * window.height;
    if n == 0 || pairs.is_empty() {
        return 0.0;
    }
    let mut total = 0.0f64;
    for &(wi, ii) in pairs {
        let mut sum = 0.0f64;
        for y in 0..window.height {
            let sy = y0 + y as i64;
            for x in 0..window.width {
                let a = window.get_index(x, y, wi);
                let b = image.sample(x0 + x as i64, sy, ii, BoundaryPolicy::Zero);
                sum += (a - b).abs() as f64;
            }
        }
        total += sum / n as f64;
    }
    total / pairs.len() as f64
}

/// Mean absolute difference of single samples at `a[(ax, ay)]` and
/// `b[(bx, by)]`, averaged over channel `pairs`. Out-of-range samples read `0.0`.
pub fn sample_error(
    a: &Image,
    ax: i64,
    ay: i64,
    b: &Image,
    bx: i64,
    by: i64,
    pairs: &[(usize, usize)],
) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let sum: f64 = pairs
        .iter()
        .map(|&(ai, bi)| {
            let va = a.sample(ax, ay, ai, BoundaryPolicy::Zero);
            let vb = b.sample(bx, by, bi, BoundaryPolicy::Zero);
            (va - vb).abs() as f64
        })
        .sum();
    sum / pairs.len() as f64
}

/// Like [`window_error`] but reads `image` by bilinear interpolation at the
/// fractional origin `(x0, y0)`.
pub fn interpolated_window_error(
    window: &Image,
    image: &Image,
    x0: f64,
    y0: f64,
    pairs: &[(usize, usize)],
) -> f64 {
    let n = window.width * window.height;
    if n == 0 || pairs.is_empty() {
        return 0.0;
    }
    let mut total = 0.0f64;
    for &(wi, ii) in pairs {
        let mut sum = 0.0f64;
        for y in 0..window.height {
            for x in 0..window.width {
                let a = window.get_index(x, y, wi);
                let b = image.sample_bilinear(x0 + x as f64, y0 + y as f64, ii);
                sum += (a - b).abs() as f64;
            }
        }
        total += sum / n as f64;
    }
    total / pairs.len() as f64
}

impl Add<f32> for &Image {
    type Output = Image;

    fn add(self, value: f32) -> Image {
        self.map(|v| v + value)
    }
}

impl Sub<f32> for &Image {
    type Output = Image;

    fn sub(self, value: f32) -> Image {
        self.map(|v| v - value)
    }
}

impl Mul<f32> for &Image {
    type Output = Image;

    fn mul(self, value: f32) -> Image {
        self.map(|v| v * value)
    }
}

impl Div<f32> for &Image {
    type Output = Image;

    fn div(self, value: f32) -> Image {
        self.map(|v| v / value)
    }
}

/// Divides in place, keeping the storage kind.
impl DivAssign<f32> for Image {
    fn div_assign(&mut self, value: f32) {
        if let Storage::Memory(grids) = &mut self.storage {
            for grid in grids.iter_mut() {
                grid.data_mut().mapv_inplace(|v| v / value);
            }
            return;
        }
        for index in 0..self.channels.len() {
            for y in 0..self.height {
                for x in 0..self.width {
                    let v = self.get_index(x, y, index) / value;
                    self.set_index(x, y, index, v);
                }
            }
        }
    }
}
