mod common;

use approx::assert_abs_diff_eq;

use driftstack_core::error::DriftError;
use driftstack_core::frame::{Channel, Image};
use driftstack_core::stack::{mean_stack, MeanAccumulator};

use common::{constant, rgb_texture};

#[test]
fn test_single_frame_stack() {
    let result = mean_stack(&[constant(4, 4, 0.5)]).unwrap();
    assert_eq!(result.get(0, 0, Channel::Gray), 0.5);
}

#[test]
fn test_mean_of_two() {
    let result = mean_stack(&[constant(4, 4, 0.0), constant(4, 4, 1.0)]).unwrap();
    assert_abs_diff_eq!(result.get(3, 2, Channel::Gray), 0.5, epsilon = 1e-6);
}

#[test]
fn test_empty_error() {
    let frames: Vec<Image> = vec![];
    assert!(matches!(mean_stack(&frames), Err(DriftError::EmptySequence)));
    assert!(MeanAccumulator::new().finish().is_err());
}

#[test]
fn test_accumulator_does_not_alter_first_frame() {
    let first = constant(3, 3, 0.2);
    let mut acc = MeanAccumulator::new();
    acc.add(&first).unwrap();
    acc.add(&constant(3, 3, 0.4)).unwrap();
    acc.add(&constant(3, 3, 0.6)).unwrap();
    assert_eq!(acc.count(), 3);
    assert_eq!(first.get(1, 1, Channel::Gray), 0.2);

    let mean = acc.finish().unwrap();
    assert_abs_diff_eq!(mean.get(1, 1, Channel::Gray), 0.4, epsilon = 1e-6);
}

#[test]
fn test_identical_color_frames() {
    let frame = rgb_texture(5, 5, 0, 0);
    let mut acc = MeanAccumulator::with_shape(5, 5, &Channel::RGB);
    for _ in 0..4 {
        acc.add(&frame).unwrap();
    }
    let mean = acc.finish().unwrap();
    for c in Channel::RGB {
        assert_abs_diff_eq!(mean.get(2, 3, c), frame.get(2, 3, c), epsilon = 1e-6);
    }
}

#[test]
fn test_mismatched_frame_rejected() {
    let mut acc = MeanAccumulator::new();
    acc.add(&constant(4, 4, 0.1)).unwrap();
    assert!(acc.add(&constant(5, 4, 0.1)).is_err());
    assert!(acc.add(&rgb_texture(4, 4, 0, 0)).is_err());
}

#[test]
fn test_out_of_core_sum_stays_mapped() {
    let mut acc = MeanAccumulator::out_of_core(6, 4, &[Channel::Gray]).unwrap();
    assert!(acc.is_out_of_core());
    acc.add(&constant(6, 4, 0.2)).unwrap();
    acc.add(&constant(6, 4, 0.6)).unwrap();
    assert!(acc.is_out_of_core());

    let mean = acc.finish().unwrap();
    assert!(mean.is_out_of_core());
    assert_abs_diff_eq!(mean.get(5, 3, Channel::Gray), 0.4, epsilon = 1e-6);
}

#[test]
fn test_in_memory_sum_by_default() {
    let mut acc = MeanAccumulator::with_shape(3, 3, &[Channel::Gray]);
    assert!(!acc.is_out_of_core());
    acc.add(&constant(3, 3, 0.5)).unwrap();
    assert!(!acc.finish().unwrap().is_out_of_core());
}
