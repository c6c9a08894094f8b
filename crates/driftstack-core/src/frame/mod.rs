//! Channel-indexed image model.
//!
//! An [`Image`] owns one plane per [`Channel`], either as in-memory [`Grid`]s
//! or as a single [`HugeFloatArray`] of shape `(width, height, channels)`.
//! Sample values are `f32`, nominally in `[0.0, 1.0]`.

mod channel;
mod filter;
mod grid;
mod ops;
mod values;

pub use channel::Channel;
pub use grid::Grid;
pub use ops::{channel_pairs, interpolated_window_error, sample_error, window_error};
pub use values::Values;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_SEGMENT_ELEMENTS, LUMINANCE_B, LUMINANCE_G, LUMINANCE_R};
use crate::error::{DriftError, Result};
use crate::huge::HugeFloatArray;

/// How samples outside the source bounds are resolved when cropping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryPolicy {
    /// Repeat the nearest edge sample.
    #[default]
    ClampToEdge,
    /// Read `0.0` outside the source.
    Zero,
}

enum Storage {
    Memory(Vec<Grid>),
    /// Indexed `[x, y, channel]`.
    Mapped(HugeFloatArray),
}

/// A set of co-registered channel planes sharing one width and height.
pub struct Image {
    width: usize,
    height: usize,
    channels: Vec<Channel>,
    storage: Storage,
}

impl Image {
    /// Zero-filled in-memory image.
    pub fn new(width: usize, height: usize, channels: &[Channel]) -> Self {
        Self {
            width,
            height,
            channels: channels.to_vec(),
            storage: Storage::Memory(channels.iter().map(|_| Grid::new(width, height)).collect()),
        }
    }

    /// Single-channel gray image wrapping `grid`.
    pub fn gray(grid: Grid) -> Self {
        Self {
            width: grid.width(),
            height: grid.height(),
            channels: vec![Channel::Gray],
            storage: Storage::Memory(vec![grid]),
        }
    }

    /// Build from `(channel, grid)` pairs. All grids must share one size and
    /// channels must be distinct.
    pub fn from_grids(planes: Vec<(Channel, Grid)>) -> Result<Self> {
        let Some((_, first)) = planes.first() else {
            return Err(DriftError::InvalidArgument("image needs at least one channel".into()));
        };
        let (width, height) = (first.width(), first.height());

        let mut channels = Vec::with_capacity(planes.len());
        let mut grids = Vec::with_capacity(planes.len());
        for (channel, grid) in planes {
            if grid.width() != width || grid.height() != height {
                return Err(DriftError::DimensionMismatch {
                    left_width: width,
                    left_height: height,
                    right_width: grid.width(),
                    right_height: grid.height(),
                });
            }
            if channels.contains(&channel) {
                return Err(DriftError::InvalidArgument(format!(
                    "duplicate {channel} channel"
                )));
            }
            channels.push(channel);
            grids.push(grid);
        }

        Ok(Self {
            width,
            height,
            channels,
            storage: Storage::Memory(grids),
        })
    }

    /// Zero-filled image backed by memory-mapped scratch files in the system
    /// temp directory.
    pub fn new_out_of_core(width: usize, height: usize, channels: &[Channel]) -> Result<Self> {
        let store = HugeFloatArray::with_segment_limit(
            &[width, height, channels.len()],
            DEFAULT_SEGMENT_ELEMENTS,
        )?;
        Ok(Self::from_store(width, height, channels, store))
    }

    /// Out-of-core image with scratch files in `dir` and a custom segment limit.
    pub fn new_out_of_core_in(
        dir: &Path,
        width: usize,
        height: usize,
        channels: &[Channel],
        max_segment_len: u64,
    ) -> Result<Self> {
        let store = HugeFloatArray::new_in(dir, &[width, height, channels.len()], max_segment_len)?;
        Ok(Self::from_store(width, height, channels, store))
    }

    fn from_store(width: usize, height: usize, channels: &[Channel], store: HugeFloatArray) -> Self {
        Self {
            width,
            height,
            channels: channels.to_vec(),
            storage: Storage::Mapped(store),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn is_out_of_core(&self) -> bool {
        matches!(self.storage, Storage::Mapped(_))
    }

    pub fn channel_index(&self, channel: Channel) -> Option<usize> {
        self.channels.iter().position(|&c| c == channel)
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        self.channel_index(channel).is_some()
    }

    /// Index of a stored channel, or [`DriftError::MissingChannel`].
    pub fn require_channel(&self, channel: Channel) -> Result<usize> {
        self.channel_index(channel)
            .ok_or(DriftError::MissingChannel(channel))
    }

    pub fn is_inside(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// The in-memory grid of a channel, if this image is not out-of-core.
    pub fn grid(&self, channel: Channel) -> Option<&Grid> {
        match &self.storage {
            Storage::Memory(grids) => self.channel_index(channel).map(|i| &grids[i]),
            Storage::Mapped(_) => None,
        }
    }

    /// Sample of the channel at `index` in [`channels`](Self::channels).
    /// Panics if `(x, y)` or `index` is out of range.
    #[inline]
    pub fn get_index(&self, x: usize, y: usize, index: usize) -> f32 {
        match &self.storage {
            Storage::Memory(grids) => grids[index].get(x, y),
            Storage::Mapped(store) => store.get_flat(self.flat(x, y, index)),
        }
    }

    #[inline]
    pub fn set_index(&mut self, x: usize, y: usize, index: usize, value: f32) {
        let flat = self.flat(x, y, index);
        match &mut self.storage {
            Storage::Memory(grids) => grids[index].set(x, y, value),
            Storage::Mapped(store) => store.set_flat(flat, value),
        }
    }

    #[inline]
    fn flat(&self, x: usize, y: usize, index: usize) -> u64 {
        debug_assert!(x < self.width && y < self.height && index < self.channels.len());
        x as u64 + (y as u64 + index as u64 * self.height as u64) * self.width as u64
    }

    /// Sample of `channel` at `(x, y)`.
    ///
    /// Channels that are not stored are derived where possible: `Gray` and
    /// `Luminance` from red, green and blue, `Alpha` as fully opaque. Any other
    /// missing channel reads `0.0`.
    pub fn get(&self, x: usize, y: usize, channel: Channel) -> f32 {
        if let Some(i) = self.channel_index(channel) {
            return self.get_index(x, y, i);
        }
        self.derive(x, y, channel)
    }

    fn derive(&self, x: usize, y: usize, channel: Channel) -> f32 {
        let rgb = || -> Option<[f32; 3]> {
            Some([
                self.get_index(x, y, self.channel_index(Channel::Red)?),
                self.get_index(x, y, self.channel_index(Channel::Green)?),
                self.get_index(x, y, self.channel_index(Channel::Blue)?),
            ])
        };
        match channel {
            Channel::Gray => rgb().map_or(0.0, |[r, g, b]| (r + g + b) / 3.0),
            Channel::Luminance => rgb().map_or(0.0, |[r, g, b]| {
                LUMINANCE_R * r + LUMINANCE_G * g + LUMINANCE_B * b
            }),
            Channel::Alpha => 1.0,
            _ => 0.0,
        }
    }

    pub fn set(&mut self, x: usize, y: usize, channel: Channel, value: f32) -> Result<()> {
        let index = self.require_channel(channel)?;
        self.set_index(x, y, index, value);
        Ok(())
    }

    /// Sample at possibly out-of-range coordinates, resolved by `policy`.
    #[inline]
    pub fn sample(&self, x: i64, y: i64, index: usize, policy: BoundaryPolicy) -> f32 {
        if self.is_inside(x, y) {
            return self.get_index(x as usize, y as usize, index);
        }
        match policy {
            BoundaryPolicy::Zero => 0.0,
            BoundaryPolicy::ClampToEdge => {
                if self.width == 0 || self.height == 0 {
                    return 0.0;
                }
                let cx = x.clamp(0, self.width as i64 - 1) as usize;
                let cy = y.clamp(0, self.height as i64 - 1) as usize;
                self.get_index(cx, cy, index)
            }
        }
    }

    /// Bilinear sample at a fractional position; samples outside the image
    /// read as `0.0`.
    pub fn sample_bilinear(&self, x: f64, y: f64, index: usize) -> f32 {
        let x0 = x.floor() as i64;
        let y0 = y.floor() as i64;
        let x1 = x0 + 1;
        let y1 = y0 + 1;

        let fx = (x - x0 as f64) as f32;
        let fy = (y - y0 as f64) as f32;

        let v00 = self.sample(x0, y0, index, BoundaryPolicy::Zero);
        let v10 = self.sample(x1, y0, index, BoundaryPolicy::Zero);
        let v01 = self.sample(x0, y1, index, BoundaryPolicy::Zero);
        let v11 = self.sample(x1, y1, index, BoundaryPolicy::Zero);

        v00 * (1.0 - fx) * (1.0 - fy)
            + v10 * fx * (1.0 - fy)
            + v01 * (1.0 - fx) * fy
            + v11 * fx * fy
    }

    /// Copy the `width x height` rectangle whose top-left corner is `(x, y)`.
    ///
    /// Always returns exactly `width x height` samples; positions outside the
    /// source follow `policy`. The result is an in-memory image.
    pub fn crop(&self, x: i64, y: i64, width: usize, height: usize, policy: BoundaryPolicy) -> Image {
        let grids = (0..self.channels.len())
            .map(|index| {
                Grid::from_fn(width, height, |col, row| {
                    self.sample(x + col as i64, y + row as i64, index, policy)
                })
            })
            .collect();
        Image {
            width,
            height,
            channels: self.channels.clone(),
            storage: Storage::Memory(grids),
        }
    }

    /// Crop a `(2 * radius_x + 1) x (2 * radius_y + 1)` window centered on
    /// `(center_x, center_y)`.
    pub fn crop_center(
        &self,
        radius_x: usize,
        radius_y: usize,
        center_x: i64,
        center_y: i64,
        policy: BoundaryPolicy,
    ) -> Image {
        self.crop(
            center_x - radius_x as i64,
            center_y - radius_y as i64,
            radius_x * 2 + 1,
            radius_y * 2 + 1,
            policy,
        )
    }

    /// Resample a `width x height` window whose top-left corner sits at the
    /// fractional position `(x, y)`, using bilinear interpolation.
    pub fn crop_interpolated(&self, x: f64, y: f64, width: usize, height: usize) -> Image {
        let grids = (0..self.channels.len())
            .map(|index| {
                Grid::from_fn(width, height, |col, row| {
                    self.sample_bilinear(x + col as f64, y + row as f64, index)
                })
            })
            .collect();
        Image {
            width,
            height,
            channels: self.channels.clone(),
            storage: Storage::Memory(grids),
        }
    }

    /// Like [`crop`](Self::crop), but the result is backed by memory-mapped
    /// scratch files.
    pub fn crop_out_of_core(
        &self,
        x: i64,
        y: i64,
        width: usize,
        height: usize,
        policy: BoundaryPolicy,
    ) -> Result<Image> {
        self.fill_out_of_core(width, height, |col, row, index| {
            self.sample(x + col as i64, y + row as i64, index, policy)
        })
    }

    /// Like [`crop_interpolated`](Self::crop_interpolated), but the result is
    /// backed by memory-mapped scratch files.
    pub fn crop_interpolated_out_of_core(
        &self,
        x: f64,
        y: f64,
        width: usize,
        height: usize,
    ) -> Result<Image> {
        self.fill_out_of_core(width, height, |col, row, index| {
            self.sample_bilinear(x + col as f64, y + row as f64, index)
        })
    }

    fn fill_out_of_core(
        &self,
        width: usize,
        height: usize,
        f: impl Fn(usize, usize, usize) -> f32,
    ) -> Result<Image> {
        let mut target = Image::new_out_of_core(width, height, &self.channels)?;
        for index in 0..self.channels.len() {
            for row in 0..height {
                for col in 0..width {
                    target.set_index(col, row, index, f(col, row, index));
                }
            }
        }
        Ok(target)
    }

    /// Deep copy into in-memory storage.
    pub fn to_memory(&self) -> Image {
        self.crop(0, 0, self.width, self.height, BoundaryPolicy::Zero)
    }

    /// Lazy iterator over every sample, channel by channel, then row by row.
    pub fn values(&self) -> Values<'_> {
        Values::new(self, (0..self.channels.len()).collect())
    }

    /// Lazy iterator over the samples of one stored channel.
    pub fn channel_values(&self, channel: Channel) -> Result<Values<'_>> {
        let index = self.require_channel(channel)?;
        Ok(Values::new(self, vec![index]))
    }

    pub fn mean(&self) -> f64 {
        values::mean(self.values())
    }

    /// Population standard deviation over all samples of all channels.
    pub fn std_dev(&self) -> f64 {
        values::std_dev(self.values())
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("out_of_core", &self.is_out_of_core())
            .finish()
    }
}
