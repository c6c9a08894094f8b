mod common;

use driftstack_core::frame::{Channel, Grid, Image};
use driftstack_core::io::image_io::{load_image, load_image_out_of_core, save_image};

use common::rgb_texture;

#[test]
fn test_save_load_roundtrip_tiff() {
    let mut grid = Grid::new(4, 4);
    grid.set(1, 0, 0.5);
    grid.set(0, 1, 1.0);
    grid.set(3, 2, 0.25);
    let image = Image::gray(grid);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.tiff");
    save_image(&image, &path).unwrap();
    let loaded = load_image(&path).unwrap();

    assert_eq!((loaded.width(), loaded.height()), (4, 4));
    assert_eq!(loaded.channels(), &[Channel::Gray]);
    assert!(loaded.get(0, 0, Channel::Gray).abs() < 1e-4);
    assert!((loaded.get(1, 0, Channel::Gray) - 0.5).abs() < 1e-4);
    assert!((loaded.get(0, 1, Channel::Gray) - 1.0).abs() < 1e-4);
    assert!((loaded.get(3, 2, Channel::Gray) - 0.25).abs() < 1e-4);
}

#[test]
fn test_color_roundtrip_png() {
    let image = rgb_texture(6, 5, 0, 0);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("color.png");
    save_image(&image, &path).unwrap();

    let loaded = load_image(&path).unwrap();
    assert_eq!(loaded.channels(), &Channel::RGB);
    for c in Channel::RGB {
        for y in 0..5 {
            for x in 0..6 {
                assert!((loaded.get(x, y, c) - image.get(x, y, c)).abs() <= 0.5 / 255.0 + 1e-6);
            }
        }
    }
}

#[test]
fn test_out_of_core_load_matches() {
    let image = rgb_texture(7, 4, 2, 2);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.tif");
    save_image(&image, &path).unwrap();

    let memory = load_image(&path).unwrap();
    let mapped = load_image_out_of_core(&path).unwrap();
    assert!(mapped.is_out_of_core());
    let a: Vec<f32> = memory.values().collect();
    let b: Vec<f32> = mapped.values().collect();
    assert_eq!(a, b);
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_image(&dir.path().join("absent.png")).is_err());
}
