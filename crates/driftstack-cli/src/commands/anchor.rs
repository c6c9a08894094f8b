use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use driftstack_core::align::AnchorSelector;
use driftstack_core::io::image_io::load_image;
use driftstack_core::pipeline::config::AnchorConfig;
use driftstack_core::pipeline::default_radius;

#[derive(Args)]
pub struct AnchorArgs {
    /// Image to scan
    pub file: PathBuf,

    /// Window radius (default: sqrt of the smaller image side)
    #[arg(short, long)]
    pub radius: Option<usize>,

    /// Fraction of each side excluded from the scan (default: 0.25)
    #[arg(long)]
    pub inset: Option<f64>,

    /// Scan step is radius / step-factor (default: 1)
    #[arg(long)]
    pub step_factor: Option<usize>,
}

pub fn run(args: &AnchorArgs) -> Result<()> {
    let image = load_image(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    let config = anchor_config(args)?;

    let radius = args
        .radius
        .unwrap_or_else(|| default_radius(image.width(), image.height()));
    let anchor = AnchorSelector::new(radius, config).find(&image);

    if anchor.contrast > 0.0 {
        println!(
            "Anchor at ({}, {}), radius {}, contrast {:.5}",
            anchor.x, anchor.y, radius, anchor.contrast
        );
    } else {
        println!("No contrast found in the scan area of {}", args.file.display());
    }
    Ok(())
}

fn anchor_config(args: &AnchorArgs) -> Result<AnchorConfig> {
    let mut config = AnchorConfig::default();
    if let Some(inset) = args.inset {
        config.inset = inset;
    }
    if let Some(step_factor) = args.step_factor {
        config.step_factor = step_factor;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        args: AnchorArgs,
    }

    fn parse(argv: &[&str]) -> AnchorArgs {
        Cli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn omitted_flags_use_config_defaults() {
        let args = parse(&["anchor", "frame.png"]);
        assert_eq!(anchor_config(&args).unwrap(), AnchorConfig::default());
    }

    #[test]
    fn flags_override_and_validate() {
        let args = parse(&["anchor", "frame.png", "--inset", "0.1", "--step-factor", "4"]);
        let config = anchor_config(&args).unwrap();
        assert_eq!((config.inset, config.step_factor), (0.1, 4));

        let args = parse(&["anchor", "frame.png", "--inset", "0.5"]);
        assert!(anchor_config(&args).is_err());
    }
}
