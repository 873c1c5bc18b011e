//! Tesseract OCR backend
//!
//! Uses `leptess` (Tesseract + Leptonica bindings). A fresh Tesseract handle
//! is created per call: handles are not thread-safe, and rotation workers
//! call `detect` concurrently.

use leptess::{capi, LepTess};
use tracing::{debug, info};

use crate::error::OcrError;
use crate::vision::ocr::{OcrEngine, OcrGranularity, OcrRegion};

/// Tesseract engine wrapper
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    language: String,
    granularity: OcrGranularity,
}

impl TesseractEngine {
    /// Create an engine for the given language hint (e.g. `"eng+rus"`).
    ///
    /// Fails early if the language data cannot be loaded.
    pub fn new(language: &str, granularity: OcrGranularity) -> Result<Self, OcrError> {
        info!("Initializing Tesseract engine with language: {}", language);

        LepTess::new(None, language).map_err(|e| OcrError::Init(e.to_string()))?;

        Ok(Self {
            language: language.to_string(),
            granularity,
        })
    }

    /// Get the current language
    pub fn language(&self) -> &str {
        &self.language
    }

    fn iterator_level(&self) -> capi::TessPageIteratorLevel {
        match self.granularity {
            OcrGranularity::Paragraph => capi::TessPageIteratorLevel_RIL_PARA,
            OcrGranularity::Line => capi::TessPageIteratorLevel_RIL_TEXTLINE,
            OcrGranularity::Word => capi::TessPageIteratorLevel_RIL_WORD,
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn detect(&self, image_data: &[u8]) -> Result<Vec<OcrRegion>, OcrError> {
        let mut lt = LepTess::new(None, &self.language).map_err(|e| OcrError::Init(e.to_string()))?;

        lt.set_image_from_mem(image_data)
            .map_err(|e| OcrError::Load(e.to_string()))?;

        // No boxes at all just means a blank page
        let Some(boxes) = lt.get_component_boxes(self.iterator_level(), true) else {
            return Ok(Vec::new());
        };

        let mut regions = Vec::new();
        for bbox in &boxes {
            let geom = bbox.get_geometry();
            lt.set_rectangle(geom.x, geom.y, geom.w, geom.h);

            let text = lt
                .get_utf8_text()
                .map_err(|e| OcrError::Engine(e.to_string()))?
                .trim()
                .to_string();

            regions.push(OcrRegion {
                x: geom.x,
                y: geom.y,
                width: geom.w,
                height: geom.h,
                text,
                confidence: lt.mean_text_conf() as f32,
            });
        }

        debug!("Tesseract: Found {} regions", regions.len());
        Ok(regions)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}
