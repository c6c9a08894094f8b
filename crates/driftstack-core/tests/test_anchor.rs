mod common;

use driftstack_core::align::AnchorSelector;
use driftstack_core::frame::{Channel, Grid, Image};
use driftstack_core::pipeline::config::AnchorConfig;

use common::texture;

/// Flat field with one textured square centered on `(cx, cy)`.
fn spot(width: usize, height: usize, cx: usize, cy: usize, half: usize) -> Grid {
    Grid::from_fn(width, height, |x, y| {
        if x.abs_diff(cx) <= half && y.abs_diff(cy) <= half {
            texture(x as i64, y as i64)
        } else {
            0.5
        }
    })
}

#[test]
fn test_anchor_on_textured_spot() {
    let image = Image::gray(spot(160, 120, 94, 48, 6));
    let anchor = AnchorSelector::with_radius(6).find(&image);
    assert_eq!((anchor.x, anchor.y), (94, 48));
}

#[test]
fn test_inset_excludes_border_features() {
    // Spot sits inside the default 25% border, so only the scan area counts.
    let image = Image::gray(spot(100, 100, 10, 10, 4));
    let selector = AnchorSelector::with_radius(4);
    let anchor = selector.find(&image);
    assert_eq!(anchor.contrast, 0.0);

    let wide = AnchorSelector::new(
        4,
        AnchorConfig {
            inset: 0.0,
            step_factor: 2,
        },
    );
    let anchor = wide.find(&image);
    assert_eq!((anchor.x, anchor.y), (10, 10));
}

#[test]
fn test_anchor_uses_every_channel() {
    let planes = vec![
        (Channel::Red, Grid::from_fn(80, 80, |_, _| 0.2)),
        (Channel::Green, spot(80, 80, 40, 30, 5)),
    ];
    let image = Image::from_grids(planes).unwrap();
    let anchor = AnchorSelector::with_radius(5).find(&image);
    assert_eq!((anchor.x, anchor.y), (40, 30));
}

#[test]
fn test_large_image_scans_rows_in_parallel() {
    let image = Image::gray(spot(300, 300, 147, 201, 6));
    let anchor = AnchorSelector::with_radius(6).find(&image);
    assert_eq!((anchor.x, anchor.y), (147, 201));
}
