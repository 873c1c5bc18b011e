//! Raster decode/encode helpers around the `image` crate

use image::{DynamicImage, GrayImage, ImageFormat, ImageResult};
use std::io::Cursor;

/// Decode any raster format `image` recognizes from memory
pub fn decode(data: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory(data)
}

/// Encode a grayscale raster as PNG, the lossless hand-off format to the engine
pub fn encode_png(image: &GrayImage) -> ImageResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
