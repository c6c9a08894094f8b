//! Pick a high-contrast window to align on.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::frame::{BoundaryPolicy, Image};
use crate::pipeline::config::AnchorConfig;

/// Center of the selected window and its standard deviation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: i64,
    pub y: i64,
    pub contrast: f64,
}

/// Scans window centers on a regular grid inside an inset border and keeps
/// the one whose `(2 * radius + 1)`-square window has the largest standard
/// deviation.
pub struct AnchorSelector {
    radius: usize,
    config: AnchorConfig,
}

impl AnchorSelector {
    pub fn new(radius: usize, config: AnchorConfig) -> Self {
        Self { radius, config }
    }

    pub fn with_radius(radius: usize) -> Self {
        Self::new(radius, AnchorConfig::default())
    }

    pub fn step(&self) -> usize {
        (self.radius / self.config.step_factor.max(1)).max(1)
    }

    /// Rows outer, columns inner; ties keep the first center found.
    ///
    /// On an image with no contrast anywhere in the scan area the result is
    /// the origin with `contrast == 0.0`.
    pub fn find(&self, image: &Image) -> Anchor {
        let inset_x = (image.width() as f64 * self.config.inset) as usize;
        let inset_y = (image.height() as f64 * self.config.inset) as usize;
        let step = self.step();
        let xs: Vec<usize> = (inset_x..image.width().saturating_sub(inset_x))
            .step_by(step)
            .collect();
        let ys: Vec<usize> = (inset_y..image.height().saturating_sub(inset_y))
            .step_by(step)
            .collect();

        let row_best: Vec<Anchor> = if image.width() * image.height() >= PARALLEL_PIXEL_THRESHOLD {
            ys.par_iter().map(|&y| self.scan_row(image, &xs, y)).collect()
        } else {
            ys.iter().map(|&y| self.scan_row(image, &xs, y)).collect()
        };

        row_best
            .into_iter()
            .fold(Anchor::default(), |best, row| {
                if row.contrast > best.contrast {
                    row
                } else {
                    best
                }
            })
    }

    fn scan_row(&self, image: &Image, xs: &[usize], y: usize) -> Anchor {
        let mut best = Anchor::default();
        for &x in xs {
            let window = image.crop_center(
                self.radius,
                self.radius,
                x as i64,
                y as i64,
                BoundaryPolicy::ClampToEdge,
            );
            let contrast = window.std_dev();
            if contrast > best.contrast {
                best = Anchor {
                    x: x as i64,
                    y: y as i64,
                    contrast,
                };
            }
        }
        best
    }
}
