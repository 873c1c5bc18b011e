//! OCR (Optical Character Recognition) capability
//!
//! The classifier never talks to a concrete engine. Anything that can turn
//! encoded image bytes into text regions implements [`OcrEngine`]; the
//! Tesseract backend lives behind the `tesseract` feature.

use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// OCR result granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrGranularity {
    /// Whole paragraphs (fewest fragments)
    #[default]
    Paragraph,
    /// Full text lines
    Line,
    /// Individual words
    Word,
}

/// Single region reported by an OCR engine
#[derive(Debug, Clone, PartialEq)]
pub struct OcrRegion {
    /// Left edge in pixels
    pub x: i32,
    /// Top edge in pixels
    pub y: i32,
    /// Region width in pixels
    pub width: i32,
    /// Region height in pixels
    pub height: i32,
    /// Recognized text
    pub text: String,
    /// Raw engine confidence, 0 - 100
    pub confidence: f32,
}

/// Text recognition backend
///
/// `detect` receives an encoded raster (PNG, JPEG, ...) and blocks until the
/// engine has finished. Implementations are shared between rotation workers
/// and must therefore be `Send + Sync`.
pub trait OcrEngine: Send + Sync {
    /// Recognize text regions in the encoded image
    fn detect(&self, image_data: &[u8]) -> Result<Vec<OcrRegion>, OcrError>;

    /// Short identifier used in logs
    fn name(&self) -> &str {
        "ocr"
    }
}
