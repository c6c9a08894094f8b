use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::align::{aligner_for, Alignment, AnchorSelector};
use crate::consts::DEBUG_DELTA_FACTOR;
use crate::error::{DriftError, Result};
use crate::frame::{BoundaryPolicy, Channel, Grid, Image};
use crate::io::image_io::{load_image, load_image_out_of_core, save_image};
use crate::stack::MeanAccumulator;

use super::config::{OutputConfig, PipelineConfig};
use super::types::{AlignmentReport, FrameReport, NoOpReporter, PipelineStage, ProgressReporter};

/// `floor(sqrt(min(width, height)))`.
pub fn default_radius(width: usize, height: usize) -> usize {
    (width.min(height) as f64).sqrt().floor() as usize
}

/// `min(min(width, height), 4 * radius)`.
pub fn default_search_radius(width: usize, height: usize, radius: usize) -> usize {
    width.min(height).min(4 * radius)
}

/// Align every input against the first one and write the aligned crops.
pub fn run_alignment(config: &PipelineConfig) -> Result<AlignmentReport> {
    run_alignment_reported(config, Arc::new(NoOpReporter))
}

/// Like [`run_alignment`], reporting each finished frame to `reporter`.
pub fn run_alignment_reported(
    config: &PipelineConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<AlignmentReport> {
    config.validate()?;
    let load = |path: &Path| {
        if config.out_of_core {
            load_image_out_of_core(path)
        } else {
            load_image(path)
        }
    };

    reporter.begin_stage(PipelineStage::Reading, Some(1));
    let base_path = &config.inputs[0];
    let reference = load(base_path)?;
    let (width, height) = (reference.width(), reference.height());
    if width == 0 || height == 0 {
        return Err(DriftError::InvalidDimensions { width, height });
    }
    info!(
        path = %base_path.display(),
        width,
        height,
        channels = reference.channels().len(),
        "Loaded reference"
    );
    let filtered_reference;
    let base = if config.median_radius > 0 {
        filtered_reference = reference.median_filter(config.median_radius)?;
        &filtered_reference
    } else {
        &reference
    };
    reporter.finish_stage();

    let radius = config.radius.unwrap_or_else(|| default_radius(width, height));
    let search_radius = config
        .search_radius
        .unwrap_or_else(|| default_search_radius(width, height, radius));

    let (center, anchor) = match config.center {
        Some(center) => (center, None),
        None => {
            reporter.begin_stage(PipelineStage::Anchoring, None);
            let anchor = AnchorSelector::new(radius, config.anchor.clone()).find(base);
            reporter.finish_stage();
            if anchor.contrast > 0.0 {
                info!(x = anchor.x, y = anchor.y, contrast = anchor.contrast, "Selected anchor");
                ((anchor.x, anchor.y), Some(anchor))
            } else {
                let fallback = ((width / 2) as i64, (height / 2) as i64);
                warn!(
                    x = fallback.0,
                    y = fallback.1,
                    "Reference has no contrast, aligning on its center"
                );
                (fallback, Some(anchor))
            }
        }
    };

    let mut align_config = config.align.clone();
    align_config.radius_x = radius;
    align_config.radius_y = radius;
    align_config.max_offset = search_radius;
    let aligner = aligner_for(&align_config);
    info!(
        method = %align_config.method,
        radius,
        search_radius,
        median_radius = config.median_radius,
        center_x = center.0,
        center_y = center.1,
        "Aligning {} frames",
        config.inputs.len()
    );

    let output = &config.output;
    if output.debug {
        let check =
            reference.crop_center(radius, radius, center.0, center.1, BoundaryPolicy::ClampToEdge);
        let path = output_path(base_path, "check", output.directory.as_deref())?;
        save_image(&check, &path)?;
        debug!(path = %path.display(), "Wrote check window");
    }

    let mut stacker = new_stacker(config, &reference)?;
    let mut frames = Vec::with_capacity(config.inputs.len());

    reporter.begin_stage(PipelineStage::Alignment, Some(config.inputs.len()));
    for (i, input) in config.inputs.iter().enumerate() {
        let loaded;
        let image = if i == 0 {
            &reference
        } else {
            loaded = load(input)?;
            &loaded
        };
        let filtered;
        let candidate = if i == 0 {
            base
        } else if config.median_radius > 0 {
            filtered = image.median_filter(config.median_radius)?;
            &filtered
        } else {
            image
        };

        let alignment = aligner.align(base, candidate, center.0, center.1, search_radius)?;
        let aligned = crop_aligned(image, &alignment, width, height, config.out_of_core)?;
        let image_error = aligned.average_error(&reference, None)?;
        let good = alignment.error <= output.error_threshold;

        let prefix = if good {
            Some(&output.prefix)
        } else if output.save_bad {
            Some(&output.prefix_bad)
        } else {
            None
        };
        let written = match prefix {
            Some(prefix) => {
                let path = output_path(input, prefix, output.directory.as_deref())?;
                save_image(&aligned, &path)?;
                Some(path)
            }
            None => None,
        };

        if output.debug {
            let path = output_path(
                input,
                &format!("delta_{}", output.prefix),
                output.directory.as_deref(),
            )?;
            save_image(&residual_image(&reference, &aligned)?, &path)?;
            debug!(path = %path.display(), "Wrote residual");
        }

        if good {
            if let Some(acc) = stacker.as_mut() {
                acc.add(&aligned)?;
            }
            info!(
                path = %input.display(),
                dx = alignment.x,
                dy = alignment.y,
                error = alignment.error,
                image_error,
                "Aligned"
            );
        } else {
            warn!(
                path = %input.display(),
                dx = alignment.x,
                dy = alignment.y,
                error = alignment.error,
                threshold = output.error_threshold,
                "Alignment error above threshold"
            );
        }

        frames.push(FrameReport {
            input: input.clone(),
            alignment,
            image_error,
            good,
            output: written,
        });
        reporter.advance(i + 1);
    }
    reporter.finish_stage();

    if output.sort {
        sort_outputs(&mut frames, output)?;
    }

    let stack = match (stacker, &output.stack) {
        (Some(acc), Some(path)) if acc.count() > 0 => {
            reporter.begin_stage(PipelineStage::Stacking, None);
            let count = acc.count();
            save_image(&acc.finish()?, path)?;
            info!(path = %path.display(), frames = count, "Wrote stack");
            reporter.finish_stage();
            Some(path.clone())
        }
        (_, Some(path)) => {
            warn!(path = %path.display(), "No good frames, stack not written");
            None
        }
        _ => None,
    };

    Ok(AlignmentReport {
        center,
        anchor,
        radius,
        search_radius,
        frames,
        stack,
    })
}

/// Zeroed running sum shaped like the reference, when a stack is requested.
fn new_stacker(config: &PipelineConfig, reference: &Image) -> Result<Option<MeanAccumulator>> {
    if config.output.stack.is_none() {
        return Ok(None);
    }
    let (width, height, channels) = (reference.width(), reference.height(), reference.channels());
    let acc = if config.out_of_core {
        MeanAccumulator::out_of_core(width, height, channels)?
    } else {
        MeanAccumulator::with_shape(width, height, channels)
    };
    Ok(Some(acc))
}

/// Crop `image` to `width x height` at the alignment offset.
fn crop_aligned(
    image: &Image,
    alignment: &Alignment,
    width: usize,
    height: usize,
    out_of_core: bool,
) -> Result<Image> {
    let (x, y) = (alignment.x, alignment.y);
    match alignment.subpixel {
        Some((fx, fy)) if fx != 0.0 || fy != 0.0 => {
            let (x, y) = (x as f64 + fx, y as f64 + fy);
            if out_of_core {
                image.crop_interpolated_out_of_core(x, y, width, height)
            } else {
                Ok(image.crop_interpolated(x, y, width, height))
            }
        }
        _ if out_of_core => {
            image.crop_out_of_core(x, y, width, height, BoundaryPolicy::ClampToEdge)
        }
        _ => Ok(image.crop(x, y, width, height, BoundaryPolicy::ClampToEdge)),
    }
}

/// Reference minus frame, averaged over channels and amplified, as RGB:
/// red where the frame is brighter, blue where it is darker.
fn residual_image(reference: &Image, aligned: &Image) -> Result<Image> {
    let delta = reference.delta(aligned, DEBUG_DELTA_FACTOR)?;
    let n = delta.channels().len();
    let mean = Grid::from_fn(delta.width(), delta.height(), |x, y| {
        (0..n).map(|i| delta.get_index(x, y, i)).sum::<f32>() / n as f32
    });
    let plane = |f: fn(f32) -> f32| {
        Grid::from_fn(mean.width(), mean.height(), |x, y| f(mean.get(x, y)))
    };
    Image::from_grids(vec![
        (Channel::Red, plane(|v| if v < 0.0 { -v } else { v * 0.5 })),
        (Channel::Green, plane(|v| v.abs() * 0.5)),
        (Channel::Blue, plane(|v| if v > 0.0 { v } else { -v * 0.5 })),
    ])
}

/// Rename written frames to `<prefix>_NNNN_<name>` in order of increasing
/// alignment error. Good and bad frames share one counter.
fn sort_outputs(frames: &mut [FrameReport], output: &OutputConfig) -> Result<()> {
    let mut order: Vec<usize> = (0..frames.len())
        .filter(|&i| frames[i].output.is_some())
        .collect();
    order.sort_by(|&a, &b| frames[a].alignment.error.total_cmp(&frames[b].alignment.error));

    for (rank, i) in order.into_iter().enumerate() {
        let frame = &mut frames[i];
        let Some(path) = frame.output.take() else {
            continue;
        };
        let prefix = if frame.good {
            &output.prefix
        } else {
            &output.prefix_bad
        };
        let sorted = output_path(&frame.input, &format!("{prefix}_{rank:04}"), path.parent())?;
        std::fs::rename(&path, &sorted)?;
        debug!(from = %path.display(), to = %sorted.display(), "Renamed");
        frame.output = Some(sorted);
    }
    Ok(())
}

fn output_path(input: &Path, prefix: &str, directory: Option<&Path>) -> Result<PathBuf> {
    let name = input.file_name().ok_or_else(|| {
        DriftError::InvalidArgument(format!("input has no file name: {}", input.display()))
    })?;
    let file_name = format!("{prefix}_{}", name.to_string_lossy());
    let dir = directory
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    Ok(dir.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_reference_size() {
        assert_eq!(default_radius(640, 480), 21);
        assert_eq!(default_search_radius(640, 480, 21), 84);
        assert_eq!(default_search_radius(50, 60, 20), 50);
    }

    #[test]
    fn output_name_prefixed() {
        let path = output_path(Path::new("/data/frame01.png"), "aligned", None).unwrap();
        assert_eq!(path, PathBuf::from("/data/aligned_frame01.png"));

        let path = output_path(
            Path::new("frame01.png"),
            "badaligned",
            Some(Path::new("/out")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/out/badaligned_frame01.png"));
    }

    #[test]
    fn stacker_follows_storage_mode() {
        let reference = Image::new(4, 3, &[Channel::Gray]);
        let mut config = PipelineConfig::default();
        assert!(new_stacker(&config, &reference).unwrap().is_none());

        config.output.stack = Some(PathBuf::from("stack.tif"));
        let acc = new_stacker(&config, &reference).unwrap().unwrap();
        assert!(!acc.is_out_of_core());

        config.out_of_core = true;
        let acc = new_stacker(&config, &reference).unwrap().unwrap();
        assert!(acc.is_out_of_core());
    }

    #[test]
    fn residual_marks_sign() {
        let reference = Image::gray(Grid::from_fn(2, 1, |x, _| if x == 0 { 0.5 } else { 0.0 }));
        let aligned = Image::gray(Grid::from_fn(2, 1, |x, _| if x == 0 { 0.45 } else { 0.05 }));
        let residual = residual_image(&reference, &aligned).unwrap();
        // reference brighter: blue
        assert!((residual.get(0, 0, Channel::Blue) - 0.5).abs() < 1e-5);
        assert!((residual.get(0, 0, Channel::Red) - 0.25).abs() < 1e-5);
        // frame brighter: red
        assert!((residual.get(1, 0, Channel::Red) - 0.5).abs() < 1e-5);
        assert!((residual.get(1, 0, Channel::Blue) - 0.25).abs() < 1e-5);
    }
}
