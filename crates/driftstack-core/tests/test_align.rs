mod common;

use std::sync::Mutex;

use approx::assert_abs_diff_eq;

use driftstack_core::align::{HierarchicalAligner, ImageAligner, Improvement, SimpleAligner};
use driftstack_core::error::DriftError;
use driftstack_core::frame::Channel;
use driftstack_core::pipeline::config::AlignConfig;

use common::{checkerboard_patch, constant, out_of_core_copy, rgb_texture, shifted_texture, smooth_pattern};

fn sequential(radius: usize) -> AlignConfig {
    AlignConfig {
        parallel: false,
        ..AlignConfig::with_radius(radius)
    }
}

#[test]
fn test_identity_short_circuit() {
    let image = shifted_texture(32, 32, 0, 0);
    let aligner = HierarchicalAligner::with_radius(4);
    let result = aligner.align(&image, &image, 16, 16, 5).unwrap();
    assert_eq!((result.x, result.y), (0, 0));
    assert_eq!(result.error, 0.0);
    assert_eq!(result.subpixel, None);
    assert!(!result.improved());
}

#[test]
fn test_identity_reports_zero_subpixel_when_enabled() {
    let image = shifted_texture(32, 32, 0, 0);
    let aligner = HierarchicalAligner::new(AlignConfig {
        subpixel_step: 0.5,
        ..sequential(4)
    });
    let result = aligner.align(&image, &image, 16, 16, 5).unwrap();
    assert_eq!(result.subpixel, Some((0.0, 0.0)));
}

#[test]
fn test_recovers_exact_shift() {
    let base = shifted_texture(64, 64, 0, 0);
    let image = shifted_texture(64, 64, 3, -2);
    let aligner = HierarchicalAligner::new(sequential(6));
    let result = aligner.align(&base, &image, 32, 32, 5).unwrap();
    assert_eq!((result.x, result.y), (3, -2));
    assert_eq!(result.error, 0.0);
    assert!(result.improved());
}

#[test]
fn test_recovers_checkerboard_shift() {
    let base = checkerboard_patch(64, 64, 0, 0);
    let image = checkerboard_patch(64, 64, 3, -2);
    let aligner = HierarchicalAligner::new(sequential(12));
    let result = aligner.align(&base, &image, 30, 30, 4).unwrap();
    assert_eq!((result.x, result.y), (3, -2));
    assert_eq!(result.error, 0.0);

    let simple = SimpleAligner::new(sequential(12))
        .align(&base, &image, 30, 30, 4)
        .unwrap();
    assert_eq!((simple.x, simple.y), (3, -2));
}

#[test]
fn test_stage_hits_are_nested() {
    let base = shifted_texture(64, 64, 0, 0);
    let image = shifted_texture(64, 64, -4, 1);
    let aligner = HierarchicalAligner::new(sequential(6));
    let result = aligner.align(&base, &image, 32, 32, 5).unwrap();
    let hits = result.hits;
    assert!(hits.stage0 <= 11 * 11);
    assert!(hits.stage1 <= hits.stage0);
    assert!(hits.stage2 <= hits.stage1);
    assert!(hits.stage2 >= 1);
}

#[test]
fn test_agrees_with_simple_aligner() {
    let base = shifted_texture(64, 64, 0, 0);
    let simple = SimpleAligner::new(sequential(5));
    let staged = HierarchicalAligner::new(sequential(5));
    for &(dx, dy) in &[(0, 0), (2, 3), (-4, 1), (5, -5), (-1, -3)] {
        let image = shifted_texture(64, 64, dx, dy);
        let a = simple.align(&base, &image, 30, 34, 5).unwrap();
        let b = staged.align(&base, &image, 30, 34, 5).unwrap();
        assert_eq!((a.x, a.y), (dx, dy));
        assert_eq!((a.x, a.y), (b.x, b.y));
        assert_abs_diff_eq!(a.error, b.error, epsilon = 1e-12);
    }
}

#[test]
fn test_rgb_channels() {
    let base = rgb_texture(48, 48, 0, 0);
    let image = rgb_texture(48, 48, -2, 4);
    let aligner = HierarchicalAligner::new(sequential(5));
    let result = aligner.align(&base, &image, 24, 24, 5).unwrap();
    assert_eq!((result.x, result.y), (-2, 4));

    let green_only = HierarchicalAligner::new(AlignConfig {
        channels: vec![Channel::Green],
        ..sequential(5)
    });
    let result = green_only.align(&base, &image, 24, 24, 5).unwrap();
    assert_eq!((result.x, result.y), (-2, 4));
}

#[test]
fn test_missing_channel_is_an_error() {
    let base = shifted_texture(32, 32, 0, 0);
    let image = shifted_texture(32, 32, 1, 1);
    let aligner = HierarchicalAligner::new(AlignConfig {
        channels: vec![Channel::Red],
        ..sequential(4)
    });
    let err = aligner.align(&base, &image, 16, 16, 3).unwrap_err();
    assert!(matches!(err, DriftError::MissingChannel(Channel::Red)));
}

#[test]
fn test_improvements_strictly_decrease() {
    let base = shifted_texture(64, 64, 0, 0);
    let image = shifted_texture(64, 64, 4, 4);
    let aligner = HierarchicalAligner::new(sequential(6));
    let trace: Mutex<Vec<Improvement>> = Mutex::new(Vec::new());
    let result = aligner
        .align_observed(&base, &image, 32, 32, 5, |imp| {
            trace.lock().unwrap().push(*imp)
        })
        .unwrap();

    let trace = trace.into_inner().unwrap();
    assert_eq!(trace.len(), result.hits.stage2);
    assert!(trace.windows(2).all(|w| w[1].error < w[0].error));
    let last = trace.last().unwrap();
    assert_eq!((last.x, last.y), (result.x, result.y));
    assert_eq!(last.error, result.error);
}

#[test]
fn test_parallel_search_matches_sequential() {
    let base = shifted_texture(128, 128, 0, 0);
    let image = shifted_texture(128, 128, 5, 7);

    let parallel = HierarchicalAligner::new(AlignConfig::with_radius(10));
    let a = parallel.align(&base, &image, 64, 64, 48).unwrap();
    let b = HierarchicalAligner::new(sequential(10))
        .align(&base, &image, 64, 64, 48)
        .unwrap();

    assert_eq!((a.x, a.y), (5, 7));
    assert_eq!((a.x, a.y, a.error), (b.x, b.y, b.error));
}

#[test]
fn test_subpixel_refinement() {
    let base = smooth_pattern(80, 80, 0.0, 0.0);
    let image = smooth_pattern(80, 80, 3.5, -2.5);
    let aligner = HierarchicalAligner::new(AlignConfig {
        subpixel_step: 0.25,
        fast_error_threshold: 1e6,
        ..sequential(8)
    });
    let result = aligner.align(&base, &image, 40, 40, 6).unwrap();
    let (ox, oy) = result.offset();
    assert_abs_diff_eq!(ox, 3.5, epsilon = 1e-9);
    assert_abs_diff_eq!(oy, -2.5, epsilon = 1e-9);
    let (fx, fy) = result.subpixel.unwrap();
    assert!((-1.0..1.0).contains(&fx));
    assert!((-1.0..1.0).contains(&fy));
}

#[test]
fn test_subpixel_keeps_exact_integer_match() {
    let base = shifted_texture(64, 64, 0, 0);
    let image = shifted_texture(64, 64, -3, 2);
    let aligner = HierarchicalAligner::new(AlignConfig {
        subpixel_step: 0.5,
        ..sequential(6)
    });
    let result = aligner.align(&base, &image, 32, 32, 5).unwrap();
    assert_eq!((result.x, result.y), (-3, 2));
    assert_eq!(result.subpixel, Some((0.0, 0.0)));
    assert_eq!(result.error, 0.0);
}

#[test]
fn test_out_of_core_images_align_the_same() {
    let dir = tempfile::tempdir().unwrap();
    let base = out_of_core_copy(&shifted_texture(64, 64, 0, 0), dir.path(), 1000);
    let image = out_of_core_copy(&shifted_texture(64, 64, 2, -1), dir.path(), 1000);
    assert!(base.is_out_of_core());

    let result = HierarchicalAligner::new(sequential(6))
        .align(&base, &image, 32, 32, 4)
        .unwrap();
    assert_eq!((result.x, result.y), (2, -1));
    assert_eq!(result.error, 0.0);
}

#[test]
fn test_flat_images_settle_on_first_offset() {
    let base = constant(32, 32, 0.4);
    let image = constant(32, 32, 0.4);
    for aligner in [
        Box::new(HierarchicalAligner::new(sequential(3))) as Box<dyn ImageAligner>,
        Box::new(SimpleAligner::new(sequential(3))),
    ] {
        let result = aligner.align(&base, &image, 16, 16, 2).unwrap();
        assert_eq!((result.x, result.y), (-2, -2));
        assert_eq!(result.hits.stage2, 1);
    }
}

#[test]
fn test_parallel_ties_resolve_to_first_offset() {
    let base = constant(128, 128, 0.4);
    let image = constant(128, 128, 0.4);
    let result = HierarchicalAligner::new(AlignConfig::with_radius(10))
        .align(&base, &image, 64, 64, 48)
        .unwrap();
    assert_eq!((result.x, result.y), (-48, -48));
    assert_eq!(result.error, 0.0);
}

#[test]
fn test_no_improvement_keeps_sentinel() {
    let base = constant(24, 24, 0.0);
    let image = constant(24, 24, 1.0);
    let aligner = HierarchicalAligner::new(AlignConfig {
        initial_error: 0.5,
        ..sequential(3)
    });
    let result = aligner.align(&base, &image, 12, 12, 2).unwrap();
    assert!(!result.improved());
    assert_eq!((result.x, result.y), (0, 0));
    assert_eq!(result.error, 0.5);
}
