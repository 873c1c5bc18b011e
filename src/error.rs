//! Error types for the classification core

use thiserror::Error;

/// Failure reported by an OCR backend
#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine could not be initialised (missing language data, etc.)
    #[error("failed to initialise OCR engine: {0}")]
    Init(String),
    /// The engine could not load the supplied image bytes
    #[error("OCR engine could not load image: {0}")]
    Load(String),
    /// Recognition itself failed
    #[error("text detection failed: {0}")]
    Engine(String),
}

/// Failure of a whole `detect_text` call
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Ocr(#[from] OcrError),
    /// The processed image could not be re-encoded before an engine call
    #[error("failed to encode processed image: {0}")]
    Encode(#[from] image::ImageError),
    /// A search worker could not be started
    #[error("rotation worker failed: {0}")]
    Worker(String),
}

pub type Result<T, E = ClassifyError> = std::result::Result<T, E>;
