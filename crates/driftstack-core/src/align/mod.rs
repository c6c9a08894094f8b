//! Translation-only registration of a candidate image against a reference.

pub mod anchor;
pub mod hierarchical;
pub mod simple;

pub use anchor::{Anchor, AnchorSelector};
pub use hierarchical::HierarchicalAligner;
pub use simple::SimpleAligner;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::Image;
use crate::pipeline::config::{AlignConfig, AlignMethod};

/// How many candidate offsets got past each stage of the search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageHits {
    /// Offsets whose single-sample error passed the stage-0 gate.
    pub stage0: usize,
    /// Offsets whose fast-window error passed the stage-1 gate.
    pub stage1: usize,
    /// Offsets whose full-window error beat the best so far.
    pub stage2: usize,
}

/// Result of aligning a candidate against a reference.
///
/// Cropping the candidate at `(x, y)` superimposes it on the reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub x: i64,
    pub y: i64,
    /// Fractional correction in `[-1, 1)` per axis, when refinement ran.
    pub subpixel: Option<(f64, f64)>,
    /// Average error of the finest stage evaluated at the returned offset.
    pub error: f64,
    pub hits: StageHits,
}

impl Alignment {
    pub fn identity(with_subpixel: bool) -> Self {
        Self {
            subpixel: with_subpixel.then_some((0.0, 0.0)),
            ..Self::default()
        }
    }

    /// Integer plus subpixel offset.
    pub fn offset(&self) -> (f64, f64) {
        let (fx, fy) = self.subpixel.unwrap_or((0.0, 0.0));
        (self.x as f64 + fx, self.y as f64 + fy)
    }

    /// `false` when no offset beat the initial error sentinel.
    pub fn improved(&self) -> bool {
        self.hits.stage2 > 0
    }
}

/// One accepted stage-2 improvement, in acceptance order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Improvement {
    pub x: i64,
    pub y: i64,
    pub error: f64,
}

/// Finds the offset of `image` relative to `base` around an anchor center.
pub trait ImageAligner: Send + Sync {
    fn align(
        &self,
        base: &Image,
        image: &Image,
        center_x: i64,
        center_y: i64,
        max_offset: usize,
    ) -> Result<Alignment>;
}

/// Build the aligner selected by `config.method`.
pub fn aligner_for(config: &AlignConfig) -> Box<dyn ImageAligner> {
    match config.method {
        AlignMethod::Hierarchical => Box::new(HierarchicalAligner::new(config.clone())),
        AlignMethod::Simple => Box::new(SimpleAligner::new(config.clone())),
    }
}

/// Raster positions visited by the search: `dy` outer, `dx` inner, both
/// ascending over `-max_offset..=max_offset`.
pub(crate) fn raster_index(dx: i64, dy: i64, max_offset: usize) -> usize {
    let m = max_offset as i64;
    let side = 2 * m + 1;
    ((dy + m) * side + (dx + m)) as usize
}
