//! Image preprocessing for OCR
//!
//! Normalizes arbitrary input into a denoised grayscale raster whose size is
//! picked from the pixel count, and rotates processed rasters for the
//! rotation search.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use tracing::debug;

use crate::config::PreprocessConfig;

const HALF_MEGAPIXEL: u64 = 500_000;
const ONE_MEGAPIXEL: u64 = 1_000_000;
const TWO_MEGAPIXELS: u64 = 2_000_000;
const THREE_MEGAPIXELS: u64 = 3_000_000;

const WHITE: Luma<u8> = Luma([255]);

/// Output of a successful preprocessing run
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Resized, grayscale, denoised raster
    pub image: GrayImage,
    /// Multiplier applied to the original dimensions
    pub scale_factor: f64,
}

/// Deterministic scale / grayscale / denoise pipeline
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Create a preprocessor with the given settings
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline.
    ///
    /// Returns `None` when either side is at or below the minimum dimension;
    /// such images are too small to be worth recognizing.
    pub fn process(&self, image: &DynamicImage) -> Option<Preprocessed> {
        let (width, height) = (image.width(), image.height());
        if width <= self.config.min_dimension || height <= self.config.min_dimension {
            debug!("Skipping preprocessing for {}x{} image", width, height);
            return None;
        }

        let (new_width, new_height, scale_factor) = target_dimensions(width, height);
        debug!(
            "Preprocessing {}x{} -> {}x{} (scale {:.4}, binarize={})",
            width, height, new_width, new_height, scale_factor, self.config.binarize
        );

        // Cubic resampling first, on the original colour data
        let scaled = image.resize_exact(new_width, new_height, FilterType::CatmullRom);
        let gray = scaled.to_luma8();
        let denoised = denoise(&gray, self.config.median_radius);

        let image = if self.config.binarize {
            otsu_binarize(&denoised)
        } else {
            denoised
        };

        Some(Preprocessed {
            image,
            scale_factor,
        })
    }
}

/// Pick target dimensions and the scale factor from the total pixel count
///
/// | pixels   | scale               |
/// |----------|---------------------|
/// | < 0.5 MP | 4.0                 |
/// | < 1 MP   | 3.0                 |
/// | < 2 MP   | 1.5                 |
/// | <= 3 MP  | 1.0                 |
/// | > 3 MP   | sqrt(3 MP / pixels) |
pub fn target_dimensions(width: u32, height: u32) -> (u32, u32, f64) {
    let pixels = u64::from(width) * u64::from(height);

    match pixels {
        p if p < HALF_MEGAPIXEL => (width * 4, height * 4, 4.0),
        p if p < ONE_MEGAPIXEL => (width * 3, height * 3, 3.0),
        p if p < TWO_MEGAPIXELS => (width * 3 / 2, height * 3 / 2, 1.5),
        p if p <= THREE_MEGAPIXELS => (width, height, 1.0),
        p => {
            let scale = (THREE_MEGAPIXELS as f64 / p as f64).sqrt();
            let new_width = ((f64::from(width) * scale) as u32).max(1);
            let new_height = ((f64::from(height) * scale) as u32).max(1);
            (new_width, new_height, scale)
        }
    }
}

/// Median filter over a `(2r+1) x (2r+1)` neighbourhood
fn denoise(image: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return image.clone();
    }
    imageproc::filter::median_filter(image, radius, radius)
}

/// Threshold at Otsu's level: pixels above the level become white, the rest black
pub fn otsu_binarize(image: &GrayImage) -> GrayImage {
    let level = imageproc::contrast::otsu_level(image);
    debug!("Otsu threshold level: {}", level);

    let mut binary = image.clone();
    for pixel in binary.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > level { 255 } else { 0 };
    }
    binary
}

/// Rotate clockwise by `angle_deg` degrees.
///
/// Multiples of 90 are exact transpositions. Any other angle resizes the
/// canvas to the rotated bounding box and fills uncovered area with white.
pub fn rotate(image: &GrayImage, angle_deg: i32) -> GrayImage {
    match angle_deg.rem_euclid(360) {
        0 => image.clone(),
        90 => imageops::rotate90(image),
        180 => imageops::rotate180(image),
        270 => imageops::rotate270(image),
        angle => rotate_with_padding(image, angle),
    }
}

fn rotate_with_padding(image: &GrayImage, angle_deg: i32) -> GrayImage {
    let theta = f64::from(angle_deg).to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let (width, height) = (f64::from(image.width()), f64::from(image.height()));

    // Exact bounding box of the rotated content
    let canvas_width = ((width * cos + height * sin).ceil() as u32).max(1);
    let canvas_height = ((width * sin + height * cos).ceil() as u32).max(1);

    let projection = Projection::translate(canvas_width as f32 / 2.0, canvas_height as f32 / 2.0)
        * Projection::rotate(theta as f32)
        * Projection::translate(-(width as f32) / 2.0, -(height as f32) / 2.0);

    let mut canvas = GrayImage::from_pixel(canvas_width, canvas_height, WHITE);
    warp_into(image, &projection, Interpolation::Bilinear, WHITE, &mut canvas);
    canvas
}
