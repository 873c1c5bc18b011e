//! Two-phase text detection with a concurrent rotation search
//!
//! Phase 1 runs the engine once on the preprocessed, unrotated image. If the
//! weighted confidence reaches the acceptance threshold that result is the
//! answer. Otherwise Phase 2 hands the candidate angles to a fixed pool of
//! worker threads. The first worker to produce an accepted result raises a
//! shared cancellation flag; nobody starts a new angle after that and the
//! accepted result is returned straight away. Without an accepted result the
//! best weighted confidence seen (Phase 1 included) wins.

use crossbeam_channel::{bounded, Receiver, Sender};
use image::GrayImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, PreprocessConfig, SearchConfig};
use crate::error::{ClassifyError, Result};
use crate::vision::aggregate::aggregate;
use crate::vision::codec;
use crate::vision::ocr::OcrEngine;
use crate::vision::preprocess::{self, Preprocessed, Preprocessor};
use crate::vision::ClassifierResult;

/// Outcome of one Phase 2 attempt
struct RotationOutcome {
    angle: i32,
    result: Result<ClassifierResult>,
}

/// Everything a rotation worker needs, shared read-only between workers
struct WorkerContext {
    engine: Arc<dyn OcrEngine>,
    source: GrayImage,
    scale_factor: f64,
    acceptance_threshold: f64,
    cancelled: AtomicBool,
}

/// Text presence classifier
pub struct Classifier {
    engine: Arc<dyn OcrEngine>,
    preprocessor: Preprocessor,
    search: SearchConfig,
}

impl Classifier {
    /// Create a classifier around an OCR engine
    pub fn new(engine: Arc<dyn OcrEngine>, preprocess: PreprocessConfig, search: SearchConfig) -> Self {
        Self {
            engine,
            preprocessor: Preprocessor::new(preprocess),
            search: search.validated(),
        }
    }

    /// Create a classifier from the application configuration
    pub fn from_config(engine: Arc<dyn OcrEngine>, config: &AppConfig) -> Self {
        Self::new(engine, config.preprocess.clone(), config.search.clone())
    }

    /// Effective (validated) search settings
    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    /// Detect text in encoded image bytes.
    ///
    /// Undecodable bytes are handed to the engine as-is for a single
    /// unrotated attempt. Images too small to preprocess yield an empty
    /// result without touching the engine.
    pub fn detect_text(&self, image_data: &[u8]) -> Result<ClassifierResult> {
        let start = Instant::now();

        let image = match codec::decode(image_data) {
            Ok(image) => image,
            Err(e) => {
                warn!("Could not decode image ({}), running raw detection", e);
                let regions = self.engine.detect(image_data)?;
                return Ok(aggregate(regions, 0, 0.0));
            }
        };

        let Some(Preprocessed { image, scale_factor }) = self.preprocessor.process(&image) else {
            debug!("Image too small, returning empty result");
            return Ok(ClassifierResult::empty(0, 0.0));
        };

        let encoded = codec::encode_png(&image)?;
        let baseline = aggregate(self.engine.detect(&encoded)?, 0, scale_factor);
        debug!(
            "Phase 1: weighted confidence {:.3} ({} tokens, {} boxes)",
            baseline.weighted_confidence,
            baseline.token_count,
            baseline.boxes.len()
        );

        if baseline.weighted_confidence >= self.search.acceptance_threshold {
            info!("Phase 1 accepted in {:?}", start.elapsed());
            return Ok(baseline);
        }

        let result = self.search_rotations(image, scale_factor, baseline)?;
        info!(
            "Detection finished in {:?}: angle {}, weighted confidence {:.3}",
            start.elapsed(),
            result.angle,
            result.weighted_confidence
        );
        Ok(result)
    }

    /// Phase 2: explore the candidate angles on a bounded worker pool
    fn search_rotations(
        &self,
        source: GrayImage,
        scale_factor: f64,
        baseline: ClassifierResult,
    ) -> Result<ClassifierResult> {
        let angles = &self.search.candidate_angles;
        if angles.is_empty() {
            return Ok(baseline);
        }

        let context = Arc::new(WorkerContext {
            engine: Arc::clone(&self.engine),
            source,
            scale_factor,
            acceptance_threshold: self.search.acceptance_threshold,
            cancelled: AtomicBool::new(false),
        });

        // Both channels hold every angle, so neither side ever blocks on send
        let (job_tx, job_rx) = bounded::<i32>(angles.len());
        let (result_tx, result_rx) = bounded::<RotationOutcome>(angles.len());

        let worker_count = self.search.worker_count.min(angles.len());
        let mut spawned = 0;
        for id in 0..worker_count {
            let context = Arc::clone(&context);
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let spawn = std::thread::Builder::new()
                .name(format!("rotation-{id}"))
                .spawn(move || run_worker(&context, jobs, results));
            match spawn {
                Ok(_) => spawned += 1,
                Err(e) => warn!("Failed to spawn rotation worker {}: {}", id, e),
            }
        }
        drop(job_rx);
        drop(result_tx);

        if spawned == 0 {
            return Err(ClassifyError::Worker("no rotation worker could be started".to_string()));
        }
        debug!("Phase 2: {} angles on {} workers", angles.len(), spawned);

        for &angle in angles {
            if context.cancelled.load(Ordering::Acquire) {
                break;
            }
            if job_tx.send(angle).is_err() {
                break;
            }
        }
        drop(job_tx);

        Ok(collect_outcomes(
            &result_rx,
            baseline,
            self.search.acceptance_threshold,
        ))
    }
}

/// Pick the answer from worker outcomes as they arrive.
///
/// The first accepted result wins immediately. Otherwise the highest
/// weighted confidence wins, ties keeping whichever was seen first.
fn collect_outcomes(
    results: &Receiver<RotationOutcome>,
    baseline: ClassifierResult,
    acceptance_threshold: f64,
) -> ClassifierResult {
    let mut best = baseline;

    for outcome in results.iter() {
        let result = match outcome.result {
            Ok(result) => result,
            Err(e) => {
                warn!("Rotation {} failed: {}", outcome.angle, e);
                continue;
            }
        };
        debug!(
            "Rotation {}: weighted confidence {:.3}",
            outcome.angle, result.weighted_confidence
        );

        if result.weighted_confidence >= acceptance_threshold {
            let discarded = results.try_iter().count();
            if discarded > 0 {
                debug!("Discarding {} late rotation results", discarded);
            }
            return result;
        }
        if result.weighted_confidence > best.weighted_confidence {
            best = result;
        }
    }

    best
}

fn run_worker(context: &WorkerContext, jobs: Receiver<i32>, results: Sender<RotationOutcome>) {
    loop {
        if context.cancelled.load(Ordering::Acquire) {
            break;
        }
        let Ok(angle) = jobs.recv() else {
            break;
        };
        // The flag may have been raised while this worker was waiting
        if context.cancelled.load(Ordering::Acquire) {
            break;
        }

        let result = attempt_rotation(context, angle);
        let accepted = matches!(&result, Ok(r) if r.weighted_confidence >= context.acceptance_threshold);
        if accepted {
            let _ = context
                .cancelled
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire);
        }

        // A closed channel means the collector already has its answer
        if results.send(RotationOutcome { angle, result }).is_err() || accepted {
            break;
        }
    }
}

fn attempt_rotation(context: &WorkerContext, angle: i32) -> Result<ClassifierResult> {
    let rotated = preprocess::rotate(&context.source, angle);
    let encoded = codec::encode_png(&rotated)?;
    let regions = context.engine.detect(&encoded)?;
    Ok(aggregate(regions, angle, context.scale_factor))
}
