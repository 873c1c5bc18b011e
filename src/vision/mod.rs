//! Vision/OCR Layer
//!
//! Decides whether an image contains readable text. The OCR engine itself is
//! an opaque capability ([`OcrEngine`]); this layer owns everything around it:
//! - preprocessing (scale, grayscale, median denoise, optional Otsu)
//! - token counting and confidence aggregation
//! - the two-phase rotation search

pub mod aggregate;
pub mod codec;
pub mod ocr;
pub mod preprocess;
pub mod search;
#[cfg(feature = "tesseract")]
pub mod tesseract;
pub mod tokens;

use serde::{Deserialize, Serialize};

pub use aggregate::aggregate;
pub use ocr::{OcrEngine, OcrGranularity, OcrRegion};
pub use preprocess::{Preprocessed, Preprocessor};
pub use search::Classifier;
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractEngine;
pub use tokens::count_tokens;

/// Recognized text region, in processed-image pixel coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Recognized text
    pub word: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
}

/// Outcome of one detection attempt, or the final answer of a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierResult {
    /// Unweighted mean confidence over accepted boxes (0.0 - 1.0)
    pub mean_confidence: f64,
    /// Token-weighted mean confidence (0.0 - 1.0)
    pub weighted_confidence: f64,
    /// Sum of meaningful characters over `boxes`
    pub token_count: usize,
    /// Accepted boxes, in engine emission order
    pub boxes: Vec<BoundingBox>,
    /// Clockwise rotation in degrees that produced this result
    pub angle: i32,
    /// Preprocessing scale multiplier, 0 when preprocessing was skipped
    pub scale_factor: f64,
}

impl ClassifierResult {
    /// Zero-confidence result without boxes
    pub fn empty(angle: i32, scale_factor: f64) -> Self {
        Self {
            mean_confidence: 0.0,
            weighted_confidence: 0.0,
            token_count: 0,
            boxes: Vec::new(),
            angle,
            scale_factor,
        }
    }
}
