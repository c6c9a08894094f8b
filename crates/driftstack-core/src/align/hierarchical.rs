//! Staged correlation search.
//!
//! Every integer offset in the search square is first checked with a single-sample
//! comparison. Only offsets that come close to the best single-sample
//! error so far are scored on a thin fast window, and only those close to the
//! best fast-window error are scored on the full window. The gates tighten as
//! better offsets are found, so most of the square costs one sample lookup.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use rayon::prelude::*;
use tracing::debug;

use crate::consts::PARALLEL_SEARCH_THRESHOLD;
use crate::error::Result;
use crate::frame::{
    channel_pairs, interpolated_window_error, sample_error, window_error, BoundaryPolicy,
    Channel, Image,
};
use crate::pipeline::config::AlignConfig;

use super::{raster_index, Alignment, ImageAligner, Improvement, StageHits};

/// Best offset found so far together with the stage errors that gate later
/// candidates. Always replaced as a whole.
#[derive(Clone, Copy, Debug)]
struct Best {
    x: i64,
    y: i64,
    index: Option<usize>,
    error0: f64,
    error1: f64,
    error2: f64,
}

/// Reference windows and channel mapping shared by every candidate offset.
struct Search<'a> {
    base: &'a Image,
    image: &'a Image,
    fast_window: Image,
    full_window: Image,
    pairs: Vec<(usize, usize)>,
    center_x: i64,
    center_y: i64,
    max_offset: usize,
}

#[derive(Default)]
struct Counters {
    stage0: AtomicUsize,
    stage1: AtomicUsize,
    stage2: AtomicUsize,
}

pub struct HierarchicalAligner {
    config: AlignConfig,
}

impl HierarchicalAligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    /// Square full window of `radius`, default fast window and gate.
    pub fn with_radius(radius: usize) -> Self {
        Self::new(AlignConfig::with_radius(radius))
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    fn channels(&self, base: &Image) -> Vec<Channel> {
        if self.config.channels.is_empty() {
            base.channels().to_vec()
        } else {
            self.config.channels.clone()
        }
    }

    /// Align and report every accepted improvement to `on_improvement`, in
    /// the order it was accepted.
    pub fn align_observed<F>(
        &self,
        base: &Image,
        image: &Image,
        center_x: i64,
        center_y: i64,
        max_offset: usize,
        on_improvement: F,
    ) -> Result<Alignment>
    where
        F: Fn(&Improvement) + Send + Sync,
    {
        let refine = self.config.subpixel_step > 0.0;
        if std::ptr::eq(base, image) {
            return Ok(Alignment::identity(refine));
        }

        let cfg = &self.config;
        let pairs = channel_pairs(base, image, &self.channels(base))?;
        let search = Search {
            base,
            image,
            fast_window: base.crop_center(
                cfg.fast_radius_x(),
                cfg.fast_radius_y,
                center_x,
                center_y,
                BoundaryPolicy::Zero,
            ),
            full_window: base.crop_center(
                cfg.radius_x,
                cfg.radius_y,
                center_x,
                center_y,
                BoundaryPolicy::Zero,
            ),
            pairs,
            center_x,
            center_y,
            max_offset,
        };

        let best = RwLock::new(Best {
            x: 0,
            y: 0,
            index: None,
            error0: cfg.initial_error,
            error1: cfg.initial_error,
            error2: cfg.initial_error,
        });
        let counters = Counters::default();

        let m = max_offset as i64;
        let side = 2 * max_offset + 1;
        let window_area = search.full_window.width() * search.full_window.height();
        let parallel = cfg.parallel && side * side * window_area >= PARALLEL_SEARCH_THRESHOLD;

        if parallel {
            (-m..=m).into_par_iter().for_each(|dy| {
                self.scan_row(&search, dy, &best, &counters, &on_improvement);
            });
        } else {
            for dy in -m..=m {
                self.scan_row(&search, dy, &best, &counters, &on_improvement);
            }
        }

        let best = best.into_inner().unwrap_or_else(PoisonError::into_inner);
        let hits = StageHits {
            stage0: counters.stage0.into_inner(),
            stage1: counters.stage1.into_inner(),
            stage2: counters.stage2.into_inner(),
        };

        let (subpixel, error) = if refine {
            let (fx, fy, error) = self.refine_subpixel(&search, best.x, best.y, best.error2);
            (Some((fx, fy)), error)
        } else {
            (None, best.error2)
        };

        Ok(Alignment {
            x: best.x,
            y: best.y,
            subpixel,
            error,
            hits,
        })
    }

    fn scan_row<F>(
        &self,
        search: &Search<'_>,
        dy: i64,
        best: &RwLock<Best>,
        counters: &Counters,
        on_improvement: &F,
    ) where
        F: Fn(&Improvement) + Send + Sync,
    {
        let cfg = &self.config;
        let m = search.max_offset as i64;
        let (cx, cy) = (search.center_x, search.center_y);

        for dx in -m..=m {
            let x = cx + dx;
            let y = cy + dy;

            // Gates read the best errors as one consistent snapshot. They are
            // inclusive: once a zero-error sample locks a gate at zero, an
            // exact match must still get through.
            let snapshot = *best.read().unwrap_or_else(PoisonError::into_inner);

            let error0 = sample_error(search.base, cx, cy, search.image, x, y, &search.pairs);
            if error0 > cfg.fast_error_threshold * snapshot.error0 {
                continue;
            }
            counters.stage0.fetch_add(1, Ordering::Relaxed);

            let error1 = window_error(
                &search.fast_window,
                search.image,
                x - cfg.fast_radius_x() as i64,
                y - cfg.fast_radius_y as i64,
                &search.pairs,
            );
            if error1 > cfg.fast_error_threshold * snapshot.error1 {
                continue;
            }
            counters.stage1.fetch_add(1, Ordering::Relaxed);

            let error2 = window_error(
                &search.full_window,
                search.image,
                x - cfg.radius_x as i64,
                y - cfg.radius_y as i64,
                &search.pairs,
            );

            // The best error only decreases, so losing to the snapshot loses
            // to the current best too.
            if error2 > snapshot.error2 {
                continue;
            }

            let index = raster_index(dx, dy, search.max_offset);
            let mut guard = best.write().unwrap_or_else(PoisonError::into_inner);
            let better = error2 < guard.error2
                || (error2 == guard.error2 && guard.index.is_some_and(|i| index < i));
            if better {
                *guard = Best {
                    x: dx,
                    y: dy,
                    index: Some(index),
                    error0,
                    error1,
                    error2,
                };
                counters.stage2.fetch_add(1, Ordering::Relaxed);
                debug!(dx, dy, error = error2, "alignment improved");
                on_improvement(&Improvement {
                    x: dx,
                    y: dy,
                    error: error2,
                });
            }
        }
    }

    /// Search fractional offsets in `[-1, 1)` around `(best_x, best_y)`.
    /// Returns `(fx, fy, error)`; `(0, 0, bound)` when nothing beats `bound`.
    fn refine_subpixel(
        &self,
        search: &Search<'_>,
        best_x: i64,
        best_y: i64,
        bound: f64,
    ) -> (f64, f64, f64) {
        let step = self.config.subpixel_step;
        let steps = (2.0 / step).ceil() as usize;
        let origin_x = (search.center_x + best_x - self.config.radius_x as i64) as f64;
        let origin_y = (search.center_y + best_y - self.config.radius_y as i64) as f64;

        let mut result = (0.0, 0.0, bound);
        for iy in 0..steps {
            let fy = -1.0 + iy as f64 * step;
            if fy >= 1.0 {
                break;
            }
            for ix in 0..steps {
                let fx = -1.0 + ix as f64 * step;
                if fx >= 1.0 {
                    break;
                }
                let error = interpolated_window_error(
                    &search.full_window,
                    search.image,
                    origin_x + fx,
                    origin_y + fy,
                    &search.pairs,
                );
                if error < result.2 {
                    result = (fx, fy, error);
                }
            }
        }
        result
    }
}

impl ImageAligner for HierarchicalAligner {
    fn align(
        &self,
        base: &Image,
        image: &Image,
        center_x: i64,
        center_y: i64,
        max_offset: usize,
    ) -> Result<Alignment> {
        self.align_observed(base, image, center_x, center_y, max_offset, |_| {})
    }
}
