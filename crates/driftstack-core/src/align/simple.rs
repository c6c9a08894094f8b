//! Single-stage full-window search on one channel.

use crate::error::{DriftError, Result};
use crate::frame::{channel_pairs, window_error, BoundaryPolicy, Image};
use crate::pipeline::config::AlignConfig;

use super::{Alignment, ImageAligner, StageHits};

/// Scores every offset of the search square on the full window, without
/// early rejection or subpixel refinement.
///
/// Uses the first configured channel, or the reference's first channel when
/// none is configured. Slow, but its result is the reference the staged
/// search must agree with.
pub struct SimpleAligner {
    config: AlignConfig,
}

impl SimpleAligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    pub fn with_radius(radius: usize) -> Self {
        Self::new(AlignConfig::with_radius(radius))
    }
}

impl ImageAligner for SimpleAligner {
    fn align(
        &self,
        base: &Image,
        image: &Image,
        center_x: i64,
        center_y: i64,
        max_offset: usize,
    ) -> Result<Alignment> {
        if std::ptr::eq(base, image) {
            return Ok(Alignment::identity(false));
        }

        let channel = match self.config.channels.first() {
            Some(&c) => c,
            None => *base.channels().first().ok_or_else(|| {
                DriftError::InvalidArgument("reference image has no channels".into())
            })?,
        };
        let pairs = channel_pairs(base, image, &[channel])?;

        let (rx, ry) = (self.config.radius_x, self.config.radius_y);
        let window = base.crop_center(rx, ry, center_x, center_y, BoundaryPolicy::Zero);

        let m = max_offset as i64;
        let mut best = Alignment {
            error: self.config.initial_error,
            ..Alignment::default()
        };
        let mut improvements = 0;
        for dy in -m..=m {
            for dx in -m..=m {
                let error = window_error(
                    &window,
                    image,
                    center_x + dx - rx as i64,
                    center_y + dy - ry as i64,
                    &pairs,
                );
                if error < best.error {
                    best.x = dx;
                    best.y = dy;
                    best.error = error;
                    improvements += 1;
                }
            }
        }

        best.hits = StageHits {
            stage2: improvements,
            ..StageHits::default()
        };
        Ok(best)
    }
}
