#![allow(dead_code)]

use driftstack_core::frame::{Channel, Grid, Image};

/// Deterministic high-frequency texture in `[0, 1]`, defined for any
/// integer position.
pub fn texture(x: i64, y: i64) -> f32 {
    let mut h = (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    h ^= h >> 29;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 32;
    (h % 1024) as f32 / 1023.0
}

/// Gray texture image; `shifted_texture(w, h, 0, 0)` is the reference.
///
/// Sample `(x, y)` holds the reference value at `(x - dx, y - dy)`, so the
/// expected alignment offset is `(dx, dy)`.
pub fn shifted_texture(width: usize, height: usize, dx: i64, dy: i64) -> Image {
    Image::gray(Grid::from_fn(width, height, |x, y| {
        texture(x as i64 - dx, y as i64 - dy)
    }))
}

/// 21x21 checkerboard of 0 and 1 with its top-left corner at `(20 + dx, 20 + dy)`
/// on a 0.5 field.
pub fn checkerboard_patch(width: usize, height: usize, dx: i64, dy: i64) -> Image {
    Image::gray(Grid::from_fn(width, height, |x, y| {
        let px = x as i64 - dx - 20;
        let py = y as i64 - dy - 20;
        if (0..21).contains(&px) && (0..21).contains(&py) {
            ((px + py) % 2) as f32
        } else {
            0.5
        }
    }))
}

/// Smooth pattern for subpixel tests, shifted by a fractional amount.
pub fn smooth_pattern(width: usize, height: usize, dx: f64, dy: f64) -> Image {
    Image::gray(Grid::from_fn(width, height, |x, y| {
        let u = x as f64 - dx;
        let v = y as f64 - dy;
        (0.5 + 0.2 * (0.35 * u).sin() + 0.2 * (0.27 * v).cos() + 0.05 * (0.11 * (u + v)).sin())
            as f32
    }))
}

/// RGB image whose channels are independent textures.
pub fn rgb_texture(width: usize, height: usize, dx: i64, dy: i64) -> Image {
    let planes = Channel::RGB
        .iter()
        .enumerate()
        .map(|(c, &channel)| {
            let grid = Grid::from_fn(width, height, |x, y| {
                texture(x as i64 - dx + 1000 * c as i64, y as i64 - dy)
            });
            (channel, grid)
        })
        .collect();
    Image::from_grids(planes).unwrap()
}

pub fn constant(width: usize, height: usize, value: f32) -> Image {
    Image::gray(Grid::from_fn(width, height, |_, _| value))
}

/// Copy `image` into memory-mapped storage under `dir`.
pub fn out_of_core_copy(image: &Image, dir: &std::path::Path, max_segment_len: u64) -> Image {
    let mut out = Image::new_out_of_core_in(
        dir,
        image.width(),
        image.height(),
        image.channels(),
        max_segment_len,
    )
    .unwrap();
    for c in 0..image.channels().len() {
        for y in 0..image.height() {
            for x in 0..image.width() {
                out.set_index(x, y, c, image.get_index(x, y, c));
            }
        }
    }
    out
}
