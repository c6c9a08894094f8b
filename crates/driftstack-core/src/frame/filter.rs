use rayon::prelude::*;

use super::{BoundaryPolicy, Image};
use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::Result;

impl Image {
    /// Median over a `(2 * radius + 1)` square window, per channel, with edges
    /// clamped.
    ///
    /// The result keeps the storage kind of `self`. Rows run in parallel for
    /// images of at least [`PARALLEL_PIXEL_THRESHOLD`] pixels.
    pub fn median_filter(&self, radius: usize) -> Result<Image> {
        let mut target = if self.is_out_of_core() {
            Image::new_out_of_core(self.width, self.height, &self.channels)?
        } else {
            Image::new(self.width, self.height, &self.channels)
        };
        let r = radius as i64;
        let window_len = (2 * radius + 1) * (2 * radius + 1);

        for index in 0..self.channels.len() {
            let row = |y: usize| -> Vec<f32> {
                let mut window = Vec::with_capacity(window_len);
                (0..self.width)
                    .map(|x| {
                        window.clear();
                        for dy in -r..=r {
                            for dx in -r..=r {
                                window.push(self.sample(
                                    x as i64 + dx,
                                    y as i64 + dy,
                                    index,
                                    BoundaryPolicy::ClampToEdge,
                                ));
                            }
                        }
                        let mid = window.len() / 2;
                        *window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
                    })
                    .collect()
            };

            let rows: Vec<Vec<f32>> = if self.width * self.height >= PARALLEL_PIXEL_THRESHOLD {
                (0..self.height).into_par_iter().map(&row).collect()
            } else {
                (0..self.height).map(&row).collect()
            };

            for (y, values) in rows.into_iter().enumerate() {
                for (x, v) in values.into_iter().enumerate() {
                    target.set_index(x, y, index, v);
                }
            }
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Channel, Grid};

    #[test]
    fn median_removes_isolated_spike() {
        let mut grid = Grid::from_fn(7, 7, |_, _| 0.25);
        grid.set(3, 3, 1.0);
        let filtered = Image::gray(grid).median_filter(1).unwrap();
        assert_eq!(filtered.get(3, 3, Channel::Gray), 0.25);
        assert_eq!(filtered.get(0, 6, Channel::Gray), 0.25);
    }

    #[test]
    fn median_keeps_edges_of_step() {
        let image = Image::gray(Grid::from_fn(6, 4, |x, _| if x < 3 { 0.0 } else { 1.0 }));
        let filtered = image.median_filter(1).unwrap();
        for y in 0..4 {
            for x in 0..6 {
                assert_eq!(filtered.get(x, y, Channel::Gray), image.get(x, y, Channel::Gray));
            }
        }
    }

    #[test]
    fn zero_radius_is_identity() {
        let image = Image::gray(Grid::from_fn(5, 3, |x, y| (x * 3 + y) as f32 / 20.0));
        let filtered = image.median_filter(0).unwrap();
        assert_eq!(filtered.average_error(&image, None).unwrap(), 0.0);
    }
}
