pub mod image_io;

pub use image_io::{load_image, load_image_out_of_core, save_image};
