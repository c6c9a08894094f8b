use std::path::PathBuf;

use crate::align::{Alignment, Anchor};

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Reading,
    Anchoring,
    Alignment,
    Stacking,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reading => write!(f, "Reading reference"),
            Self::Anchoring => write!(f, "Selecting anchor"),
            Self::Alignment => write!(f, "Aligning frames"),
            Self::Stacking => write!(f, "Writing stack"),
        }
    }
}

/// Thread-safe progress reporting for the pipeline.
///
/// All methods default to no-ops.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started with `total_items` work items, if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// `items_done` work items of the current stage are complete.
    fn advance(&self, _items_done: usize) {}

    fn finish_stage(&self) {}
}

pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Outcome for one input frame.
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub input: PathBuf,
    /// `alignment.error` decides whether the frame is good.
    pub alignment: Alignment,
    /// Whole-image error of the aligned crop against the reference. Border
    /// samples repeated by the crop count against it, so it is only reported.
    pub image_error: f64,
    pub good: bool,
    /// Where the aligned crop was written, after any sorting rename; `None`
    /// for skipped bad frames.
    pub output: Option<PathBuf>,
}

/// Summary of a whole run.
#[derive(Clone, Debug)]
pub struct AlignmentReport {
    /// Window center used for every frame.
    pub center: (i64, i64),
    /// Set when the center came from the anchor scan.
    pub anchor: Option<Anchor>,
    pub radius: usize,
    pub search_radius: usize,
    pub frames: Vec<FrameReport>,
    /// Mean of the good frames, when requested.
    pub stack: Option<PathBuf>,
}

impl AlignmentReport {
    pub fn good_count(&self) -> usize {
        self.frames.iter().filter(|f| f.good).count()
    }

    pub fn bad_count(&self) -> usize {
        self.frames.len() - self.good_count()
    }
}
