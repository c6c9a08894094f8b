use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use driftstack_core::pipeline::config::{AlignConfig, AlignMethod, PipelineConfig};
use driftstack_core::pipeline::run_alignment_reported;

use crate::progress::BarReporter;
use crate::summary::{print_align_summary, print_report};

#[derive(Args)]
pub struct AlignArgs {
    /// Images to align; the first one is the reference
    pub files: Vec<PathBuf>,

    /// Pipeline config file (TOML); flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Half-size of the comparison window (default: sqrt of the smaller side)
    #[arg(short = 'r', long)]
    pub check_radius: Option<usize>,

    /// Largest offset searched (default: min(smaller side, 4 * radius))
    #[arg(short, long)]
    pub search_radius: Option<usize>,

    /// Window center x (default: highest-contrast anchor)
    #[arg(long, requires = "center_y")]
    pub center_x: Option<i64>,

    /// Window center y
    #[arg(long, requires = "center_x")]
    pub center_y: Option<i64>,

    /// Frames whose alignment error exceeds this are treated as bad
    #[arg(short, long)]
    pub error_threshold: Option<f64>,

    /// File name prefix of good aligned frames
    #[arg(long)]
    pub prefix: Option<String>,

    /// File name prefix of bad aligned frames
    #[arg(long)]
    pub prefix_bad: Option<String>,

    /// Do not write frames that fail the error threshold
    #[arg(long)]
    pub skip_bad: bool,

    /// Use the exhaustive single-channel search
    #[arg(long)]
    pub simple: bool,

    /// Subpixel refinement step in (0, 2]
    #[arg(long)]
    pub subpixel_step: Option<f64>,

    /// Gate multiplier for the coarse search stages
    #[arg(long)]
    pub fast_error_threshold: Option<f64>,

    /// Comma-separated channels to compare (e.g. "red,green")
    #[arg(long)]
    pub channels: Option<String>,

    /// Search offsets on a single thread
    #[arg(long)]
    pub sequential: bool,

    /// Median filter radius applied before aligning (0 disables)
    #[arg(long)]
    pub median_radius: Option<usize>,

    /// Keep frames in memory-mapped scratch files instead of RAM
    #[arg(long)]
    pub out_of_core: bool,

    /// Write the mean of all good frames to this file
    #[arg(long)]
    pub stack: Option<PathBuf>,

    /// Directory for aligned frames (default: next to each input)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Keep input order in output names instead of numbering by error
    #[arg(long)]
    pub no_sort: bool,

    /// Also write the reference check window and per-frame residuals
    #[arg(long)]
    pub debug: bool,
}

pub fn run(args: &AlignArgs) -> Result<()> {
    let mut config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid pipeline config")?
    } else {
        PipelineConfig::default()
    };
    apply_args(&mut config, args)?;
    if config.inputs.is_empty() {
        bail!("No input images given");
    }
    config.validate()?;

    print_align_summary(&config);

    let reporter = Arc::new(BarReporter::new());
    let report = run_alignment_reported(&config, reporter)?;

    print_report(&report);
    Ok(())
}

fn apply_args(config: &mut PipelineConfig, args: &AlignArgs) -> Result<()> {
    if !args.files.is_empty() {
        config.inputs = args.files.clone();
    }
    if args.check_radius.is_some() {
        config.radius = args.check_radius;
    }
    if args.search_radius.is_some() {
        config.search_radius = args.search_radius;
    }
    if let (Some(x), Some(y)) = (args.center_x, args.center_y) {
        config.center = Some((x, y));
    }
    if let Some(radius) = args.median_radius {
        config.median_radius = radius;
    }
    if args.out_of_core {
        config.out_of_core = true;
    }

    if let Some(threshold) = args.error_threshold {
        config.output.error_threshold = threshold;
    }
    if let Some(ref prefix) = args.prefix {
        config.output.prefix = prefix.clone();
    }
    if let Some(ref prefix) = args.prefix_bad {
        config.output.prefix_bad = prefix.clone();
    }
    if args.skip_bad {
        config.output.save_bad = false;
    }
    if args.stack.is_some() {
        config.output.stack = args.stack.clone();
    }
    if args.output_dir.is_some() {
        config.output.directory = args.output_dir.clone();
    }
    if args.no_sort {
        config.output.sort = false;
    }
    if args.debug {
        config.output.debug = true;
    }

    if args.simple {
        config.align.method = AlignMethod::Simple;
    }
    if args.sequential {
        config.align.parallel = false;
    }
    if let Some(step) = args.subpixel_step {
        config.align.subpixel_step = step;
    }
    if let Some(threshold) = args.fast_error_threshold {
        config.align.fast_error_threshold = threshold;
    }
    if let Some(ref channels) = args.channels {
        let params = HashMap::from([("channels".to_string(), channels.clone())]);
        config.align.channels = AlignConfig::from_params(&params)
            .context("Invalid --channels")?
            .channels;
    }
    Ok(())
}
