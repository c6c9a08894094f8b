use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};

use crate::error::{DriftError, Result};
use crate::frame::{Channel, Grid, Image};

const U16_MAX: f32 = 65535.0;
const U8_MAX: f32 = 255.0;

/// Load an image file as normalized `f32` samples.
///
/// Color files become `Red`, `Green`, `Blue`; anything else a single `Gray`
/// channel.
pub fn load_image(path: &Path) -> Result<Image> {
    let img = image::open(path)?;
    if img.color().has_color() {
        let rgb = img.to_rgb16();
        let (w, h) = (rgb.width() as usize, rgb.height() as usize);
        let planes = Channel::RGB
            .iter()
            .enumerate()
            .map(|(c, &channel)| {
                let grid = Grid::from_fn(w, h, |x, y| {
                    rgb.get_pixel(x as u32, y as u32).0[c] as f32 / U16_MAX
                });
                (channel, grid)
            })
            .collect();
        Image::from_grids(planes)
    } else {
        let gray = img.to_luma16();
        let (w, h) = (gray.width() as usize, gray.height() as usize);
        Ok(Image::gray(Grid::from_fn(w, h, |x, y| {
            gray.get_pixel(x as u32, y as u32).0[0] as f32 / U16_MAX
        })))
    }
}

/// Like [`load_image`], but the samples land in memory-mapped scratch
/// storage instead of RAM.
pub fn load_image_out_of_core(path: &Path) -> Result<Image> {
    let img = image::open(path)?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    if img.color().has_color() {
        let rgb = img.to_rgb16();
        let mut out = Image::new_out_of_core(w, h, &Channel::RGB)?;
        for (x, y, px) in rgb.enumerate_pixels() {
            for c in 0..3 {
                out.set_index(x as usize, y as usize, c, px.0[c] as f32 / U16_MAX);
            }
        }
        Ok(out)
    } else {
        let gray = img.to_luma16();
        let mut out = Image::new_out_of_core(w, h, &[Channel::Gray])?;
        for (x, y, px) in gray.enumerate_pixels() {
            out.set_index(x as usize, y as usize, 0, px.0[0] as f32 / U16_MAX);
        }
        Ok(out)
    }
}

/// Save choosing the format from the extension: `png` is written as 8-bit,
/// everything else as 16-bit TIFF.
///
/// Images carrying red, green and blue are written as RGB, others as the
/// gray (or derived gray) channel.
pub fn save_image(image: &Image, path: &Path) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(DriftError::InvalidDimensions {
            width: image.width(),
            height: image.height(),
        });
    }
    let color = Channel::RGB.iter().all(|&c| image.has_channel(c));
    let png = matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("png")
    );

    let dynamic = match (color, png) {
        (true, true) => DynamicImage::ImageRgb8(ImageBuffer::from_fn(
            image.width() as u32,
            image.height() as u32,
            |x, y| Rgb(Channel::RGB.map(|c| to_u8(image.get(x as usize, y as usize, c)))),
        )),
        (true, false) => DynamicImage::ImageRgb16(ImageBuffer::from_fn(
            image.width() as u32,
            image.height() as u32,
            |x, y| Rgb(Channel::RGB.map(|c| to_u16(image.get(x as usize, y as usize, c)))),
        )),
        (false, true) => DynamicImage::ImageLuma8(ImageBuffer::from_fn(
            image.width() as u32,
            image.height() as u32,
            |x, y| Luma([to_u8(gray_sample(image, x, y))]),
        )),
        (false, false) => DynamicImage::ImageLuma16(ImageBuffer::from_fn(
            image.width() as u32,
            image.height() as u32,
            |x, y| Luma([to_u16(gray_sample(image, x, y))]),
        )),
    };

    let format = if png { ImageFormat::Png } else { ImageFormat::Tiff };
    dynamic.save_with_format(path, format)?;
    Ok(())
}

fn gray_sample(image: &Image, x: u32, y: u32) -> f32 {
    match image.channel_index(Channel::Gray) {
        Some(i) => image.get_index(x as usize, y as usize, i),
        None => image.get_index(x as usize, y as usize, 0),
    }
}

fn to_u16(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * U16_MAX).round() as u16
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * U8_MAX).round() as u8
}
