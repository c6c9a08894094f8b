use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_ANCHOR_INSET, DEFAULT_ANCHOR_STEP_FACTOR, DEFAULT_ERROR_THRESHOLD,
    DEFAULT_FAST_ERROR_THRESHOLD, DEFAULT_MAX_OFFSET, DEFAULT_MEDIAN_RADIUS, DEFAULT_RADIUS,
    INITIAL_BEST_ERROR,
};
use crate::error::{DriftError, Result};
use crate::frame::Channel;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignMethod {
    /// Staged coarse-to-fine search with subpixel refinement.
    #[default]
    Hierarchical,
    /// Full-window error for every offset on a single channel.
    Simple,
}

impl fmt::Display for AlignMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignMethod::Hierarchical => write!(f, "Hierarchical"),
            AlignMethod::Simple => write!(f, "Simple"),
        }
    }
}

/// Window, search and gating parameters shared by both aligners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    pub method: AlignMethod,
    /// Half-width of the full alignment window.
    pub radius_x: usize,
    /// Half-height of the full alignment window.
    pub radius_y: usize,
    /// Half-width of the stage-1 window; `None` uses `radius_x`.
    pub fast_radius_x: Option<usize>,
    /// Half-height of the stage-1 window.
    pub fast_radius_y: usize,
    /// Largest `|dx|` and `|dy|` searched.
    pub max_offset: usize,
    /// Gate multiplier applied to the best stage-0 and stage-1 errors.
    pub fast_error_threshold: f64,
    /// Subpixel step in `(0, 2]`; `0` disables refinement.
    pub subpixel_step: f64,
    /// Channels compared. Empty means every channel of the reference; the
    /// simple aligner uses only the first.
    pub channels: Vec<Channel>,
    /// Spread the offset search over the Rayon pool for large searches.
    pub parallel: bool,
    /// Best-error sentinel before any offset is accepted.
    pub initial_error: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            method: AlignMethod::default(),
            radius_x: DEFAULT_RADIUS,
            radius_y: DEFAULT_RADIUS,
            fast_radius_x: None,
            fast_radius_y: 0,
            max_offset: DEFAULT_MAX_OFFSET,
            fast_error_threshold: DEFAULT_FAST_ERROR_THRESHOLD,
            subpixel_step: 0.0,
            channels: Vec::new(),
            parallel: true,
            initial_error: INITIAL_BEST_ERROR,
        }
    }
}

impl AlignConfig {
    /// Square window of the given radius, all other parameters default.
    pub fn with_radius(radius: usize) -> Self {
        Self {
            radius_x: radius,
            radius_y: radius,
            ..Self::default()
        }
    }

    pub fn fast_radius_x(&self) -> usize {
        self.fast_radius_x.unwrap_or(self.radius_x)
    }

    /// Parse from a string-keyed parameter bag. Missing keys keep defaults,
    /// unknown keys are ignored.
    ///
    /// Keys: `radius`, `radius_x`, `radius_y`, `fast_radius_x`,
    /// `fast_radius_y`, `max_offset`, `fast_error_threshold`,
    /// `subpixel_step`, `channel`, `channels` (comma separated), `method`,
    /// `parallel`.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(r) = parse_param(params, "radius")? {
            config.radius_x = r;
            config.radius_y = r;
        }
        if let Some(v) = parse_param(params, "radius_x")? {
            config.radius_x = v;
        }
        if let Some(v) = parse_param(params, "radius_y")? {
            config.radius_y = v;
        }
        if let Some(v) = parse_param(params, "fast_radius_x")? {
            config.fast_radius_x = Some(v);
        }
        if let Some(v) = parse_param(params, "fast_radius_y")? {
            config.fast_radius_y = v;
        }
        if let Some(v) = parse_param(params, "max_offset")? {
            config.max_offset = v;
        }
        if let Some(v) = parse_param(params, "fast_error_threshold")? {
            config.fast_error_threshold = v;
        }
        if let Some(v) = parse_param(params, "subpixel_step")? {
            config.subpixel_step = v;
        }
        if let Some(v) = parse_param(params, "parallel")? {
            config.parallel = v;
        }
        if let Some(c) = parse_param::<Channel>(params, "channel")? {
            config.channels = vec![c];
        }
        if let Some(list) = params.get("channels") {
            config.channels = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<Channel>()
                        .map_err(|message| config_error("channels", message))
                })
                .collect::<Result<_>>()?;
        }
        if let Some(m) = params.get("method") {
            config.method = match m.to_ascii_lowercase().as_str() {
                "hierarchical" => AlignMethod::Hierarchical,
                "simple" => AlignMethod::Simple,
                other => {
                    return Err(config_error("method", format!("unknown method '{other}'")))
                }
            };
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fast_error_threshold.is_finite() && self.fast_error_threshold > 0.0) {
            return Err(config_error(
                "fast_error_threshold",
                format!("must be positive, got {}", self.fast_error_threshold),
            ));
        }
        if !(0.0..=2.0).contains(&self.subpixel_step) {
            return Err(config_error(
                "subpixel_step",
                format!("must be in [0, 2], got {}", self.subpixel_step),
            ));
        }
        if !(self.initial_error.is_finite() && self.initial_error > 0.0) {
            return Err(config_error(
                "initial_error",
                format!("must be positive, got {}", self.initial_error),
            ));
        }
        Ok(())
    }
}

/// Parameters of the high-contrast anchor scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Fraction of width and height excluded at each border, in `[0, 0.5)`.
    pub inset: f64,
    /// The scan step is `max(radius / step_factor, 1)`.
    pub step_factor: usize,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            inset: DEFAULT_ANCHOR_INSET,
            step_factor: DEFAULT_ANCHOR_STEP_FACTOR,
        }
    }
}

impl AnchorConfig {
    /// Keys: `anchor_inset`, `anchor_step_factor`.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = parse_param(params, "anchor_inset")? {
            config.inset = v;
        }
        if let Some(v) = parse_param(params, "anchor_step_factor")? {
            config.step_factor = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..0.5).contains(&self.inset) {
            return Err(config_error(
                "anchor_inset",
                format!("must be in [0, 0.5), got {}", self.inset),
            ));
        }
        if self.step_factor == 0 {
            return Err(config_error("anchor_step_factor", "must be at least 1"));
        }
        Ok(())
    }
}

/// What happens to each aligned frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Frames whose alignment error exceeds this are treated as bad.
    pub error_threshold: f64,
    pub prefix: String,
    pub save_bad: bool,
    pub prefix_bad: String,
    /// Where aligned frames are written; `None` writes next to each input.
    pub directory: Option<PathBuf>,
    /// Write the mean of all good frames here.
    pub stack: Option<PathBuf>,
    /// Rename written frames to `<prefix>_NNNN_<name>` by increasing error.
    pub sort: bool,
    /// Also write the reference check window and a residual per frame.
    pub debug: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            prefix: "aligned".into(),
            save_bad: true,
            prefix_bad: "badaligned".into(),
            directory: None,
            stack: None,
            sort: true,
            debug: false,
        }
    }
}

/// Full description of one align-and-stack run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reference first, then the frames to align against it.
    pub inputs: Vec<PathBuf>,
    /// Explicit anchor center; `None` runs the anchor scan on the reference.
    pub center: Option<(i64, i64)>,
    /// Window radius; `None` derives `sqrt(min(width, height))` from the reference.
    pub radius: Option<usize>,
    /// Search radius; `None` derives `min(min(width, height), 4 * radius)`.
    pub search_radius: Option<usize>,
    /// Median filter radius applied to the reference and each candidate
    /// before alignment; `0` disables it. Written crops are unfiltered.
    pub median_radius: usize,
    /// Keep frames, aligned crops and the stack sum in memory-mapped scratch
    /// storage instead of RAM.
    pub out_of_core: bool,
    pub align: AlignConfig,
    pub anchor: AnchorConfig,
    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            center: None,
            radius: None,
            search_radius: None,
            median_radius: DEFAULT_MEDIAN_RADIUS,
            out_of_core: false,
            align: AlignConfig::default(),
            anchor: AnchorConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(DriftError::EmptySequence);
        }
        self.align.validate()?;
        self.anchor.validate()
    }
}

fn parse_param<T: FromStr>(params: &HashMap<String, String>, key: &str) -> Result<Option<T>>
where
    T::Err: fmt::Display,
{
    params
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| config_error(key, format!("'{raw}': {e}")))
        })
        .transpose()
}

fn config_error(key: &str, message: impl Into<String>) -> DriftError {
    DriftError::Config {
        key: key.to_string(),
        message: message.into(),
    }
}
