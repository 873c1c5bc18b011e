//! OCR Classifier - decides whether an image contains readable text
//!
//! Wraps an opaque OCR engine in deterministic preprocessing, a two-phase
//! rotation search and token-weighted confidence aggregation.

pub mod config;
pub mod error;
pub mod server;
pub mod vision;

pub use config::AppConfig;
pub use error::{ClassifyError, OcrError};
pub use vision::{BoundingBox, Classifier, ClassifierResult, OcrEngine, OcrRegion};
