//! Confidence aggregation for a single detection attempt

use super::ocr::OcrRegion;
use super::tokens::count_tokens;
use super::{BoundingBox, ClassifierResult};

/// Fold raw engine regions into a single-pass result.
///
/// Regions with a zero (or negative) raw confidence or without a single
/// meaningful character are dropped. The remaining regions contribute to
/// the plain mean and to the token-weighted mean of their normalized
/// confidences. `angle` and `scale_factor` are copied into the result.
pub fn aggregate(regions: Vec<OcrRegion>, angle: i32, scale_factor: f64) -> ClassifierResult {
    let mut boxes = Vec::with_capacity(regions.len());
    let mut confidence_sum = 0.0;
    let mut weighted_sum = 0.0;
    let mut token_count = 0usize;

    for region in regions {
        if region.confidence <= 0.0 || region.confidence.is_nan() {
            continue;
        }
        let tokens = count_tokens(&region.text);
        if tokens == 0 {
            continue;
        }

        let confidence = normalize(f64::from(region.confidence));
        confidence_sum += confidence;
        weighted_sum += confidence * tokens as f64;
        token_count += tokens;

        boxes.push(BoundingBox {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            word: region.text,
            confidence,
        });
    }

    if boxes.is_empty() {
        return ClassifierResult::empty(angle, scale_factor);
    }

    ClassifierResult {
        mean_confidence: (confidence_sum / boxes.len() as f64).clamp(0.0, 1.0),
        weighted_confidence: (weighted_sum / token_count as f64).clamp(0.0, 1.0),
        token_count,
        boxes,
        angle,
        scale_factor,
    }
}

/// Map a 0 - 100 engine score into `[0, 1]`
fn normalize(raw: f64) -> f64 {
    (raw / 100.0).clamp(0.0, 1.0)
}
