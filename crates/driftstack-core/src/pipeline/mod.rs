pub mod config;
mod orchestrator;
mod types;

pub use orchestrator::{
    default_radius, default_search_radius, run_alignment, run_alignment_reported,
};
pub use types::{AlignmentReport, FrameReport, PipelineStage, ProgressReporter};
