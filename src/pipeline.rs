//! Runs a batch of images through preprocess, inference, postprocess and annotate.
//!
//! Images are processed one at a time. Each one runs on a blocking worker under a
//! per-image timeout; a failing or slow image is recorded and the run moves on.
//! Only a model that cannot be loaded (or unusable input/config) fails the run.
//!
//! A timed-out worker is abandoned, not killed. It notices the raised cancel flag
//! at its next stage boundary and stops there, but an inference call already in
//! progress runs to completion and keeps the engine locked until it returns, so
//! the following image, or the model check of the next run, may wait on it.
//! The engine is only ever locked from blocking workers, so such a wait never
//! stalls the async executor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::common::{Detection, ImageSource, ModelConfig};
use crate::data::{
    AnnotatedImage, DetectionSummary, EncodedFormat, ImageDetectionResult, ImageTiming, PipelineConfig,
    PipelineProgress, PipelineResult, PipelineStage, Stage, TimeCalc,
};
use crate::detection_runners::ort_detector::image_ops::preprocess_image;
use crate::detection_runners::ort_detector::postprocess::postprocess;
use crate::detection_runners::{InferenceEngine, SharedEngine};
use crate::error::DetectError;
use crate::utils::{format_duration, generate_run_id, trace};
use crate::visualizer::annotate;

/// Progress callback. Called from the task driving the pipeline, never from a worker.
pub type ProgressFn<'a> = &'a (dyn Fn(&PipelineProgress) + Send + Sync);

fn emit(on_progress: Option<ProgressFn<'_>>, progress: PipelineProgress) {
    log::debug!("Progress {}% {:?}: {}", progress.percent_complete, progress.stage, progress.message);
    if let Some(cb) = on_progress {
        cb(&progress);
    }
}

/// Detects wounds in every image of `images`, in order.
///
/// Returns `Err` only for [`DetectError::NoImages`], [`DetectError::InvalidConfig`]
/// and [`DetectError::ModelUnavailable`]; every per-image problem is reported in
/// that image's [`ImageDetectionResult`].
pub async fn run_pipeline<E: InferenceEngine + 'static>(
    engine: &SharedEngine<E>,
    mut images: Vec<ImageSource>,
    config: &PipelineConfig,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<PipelineResult, DetectError> {
    if images.is_empty() {
        return Err(DetectError::NoImages);
    }
    if config.max_images == 0 {
        return Err(DetectError::InvalidConfig("max_images must be at least 1".to_string()));
    }
    if config.image_timeout.is_zero() {
        return Err(DetectError::InvalidConfig("image_timeout must be positive".to_string()));
    }

    let run_id = config.log_prefix.clone().unwrap_or_else(generate_run_id);
    let start = Instant::now();
    let mut last = Duration::ZERO;

    let input_image_count = images.len();
    if images.len() > config.max_images {
        log::warn!(
            "[{}] Too many images ({}), processing only the first {}",
            run_id,
            images.len(),
            config.max_images
        );
        images.truncate(config.max_images);
    }
    let total = images.len();

    emit(on_progress, PipelineProgress::new(PipelineStage::LoadingModel, 0, total, "Loading wound detection model".to_string()));

    let (model_load_time, model) = match load_engine(engine, config).await {
        Ok(loaded) => loaded,
        Err(e) => {
            log::error!("[{}] Model load failed: {}", run_id, e);
            emit(on_progress, PipelineProgress::new(PipelineStage::Error, 0, total, e.to_string()));
            return Err(e);
        }
    };
    last = trace(&run_id, "load_model", start, last);

    log::info!(
        "[{}] Processing {} image(s) | conf >= {} | iou > {} | timeout {}",
        run_id,
        total,
        model.confidence_threshold,
        model.iou_threshold,
        format_duration(config.image_timeout)
    );

    let mut results = Vec::with_capacity(total);
    for (index, source) in images.into_iter().enumerate() {
        let label = source.describe();
        emit(
            on_progress,
            PipelineProgress::new(PipelineStage::ProcessingImage, index, total, format!("Analyzing image {} of {}", index + 1, total)),
        );

        let result = run_one_with_timeout(engine, source, label, &model, config, &run_id).await;
        match result.error() {
            None => {
                log::info!("[{}] Image {}: {} detection(s)", run_id, index + 1, result.detections().len());
                for det in result.detections() {
                    log::debug!("[{}]   {}", run_id, det.label());
                }
            }
            Some(e) => log::warn!("[{}] Image {} ({}) failed: {}", run_id, index + 1, result.source, e),
        }
        last = trace(&run_id, &format!("image_{}", index + 1), start, last);

        let failed = !result.is_success();
        emit(
            on_progress,
            PipelineProgress::new(PipelineStage::ImageComplete, index, total, format!("Image {} of {} complete", index + 1, total)),
        );
        results.push(result);

        if failed && !config.continue_on_error {
            log::warn!("[{}] Stopping after image {} failed", run_id, index + 1);
            break;
        }
    }

    let summary = aggregate_results(&results);
    let successful_images = results.iter().filter(|r| r.is_success()).count();
    let result = PipelineResult {
        total_detections: summary.total_count,
        successful_images,
        failed_images: results.len() - successful_images,
        summary,
        results,
        input_image_count,
        model_load_time,
        total_processing_time: start.elapsed(),
        model_config: model,
    };

    log::info!(
        "[{}] Done: {} detection(s) | {}/{} image(s) analyzed | {}",
        run_id,
        result.total_detections,
        result.successful_images,
        total,
        format_duration(result.total_processing_time)
    );
    emit(
        on_progress,
        PipelineProgress::new(
            PipelineStage::Complete,
            total,
            total,
            format!("Found {} wound(s) in {} image(s)", result.total_detections, result.successful_images),
        ),
    );

    Ok(result)
}

/// Validates the run's model config and loads the engine, both on a blocking worker.
/// Returns the load time and the effective config of the loaded engine.
async fn load_engine<E: InferenceEngine + 'static>(
    engine: &SharedEngine<E>,
    config: &PipelineConfig,
) -> Result<(Duration, ModelConfig), DetectError> {
    let engine = Arc::clone(engine);
    let config = config.clone();
    let loaded = tokio::task::spawn_blocking(move || -> Result<(Duration, ModelConfig), DetectError> {
        let mut engine = engine.lock();
        config.effective_model_config(engine.model_config()).validate()?;
        let load_time = engine.ensure_loaded()?;
        Ok((load_time, config.effective_model_config(engine.model_config())))
    })
    .await
    .map_err(|e| DetectError::ModelUnavailable(format!("model loader panicked: {}", e)))?;

    loaded.map_err(|e| match e {
        e if e.is_fatal() => e,
        e => DetectError::ModelUnavailable(e.to_string()),
    })
}

async fn run_one_with_timeout<E: InferenceEngine + 'static>(
    engine: &SharedEngine<E>,
    source: ImageSource,
    label: String,
    model: &ModelConfig,
    config: &PipelineConfig,
    run_id: &str,
) -> ImageDetectionResult {
    let started = Instant::now();
    let cancel = Arc::new(AtomicBool::new(false));

    let worker = {
        let engine = Arc::clone(engine);
        let model = model.clone();
        let cancel = Arc::clone(&cancel);
        let label = label.clone();
        let skip_visualization = config.skip_visualization;
        tokio::task::spawn_blocking(move || process_one_image(&engine, &source, label, &model, skip_visualization, &cancel))
    };

    match tokio::time::timeout(config.image_timeout, worker).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => ImageDetectionResult::failure(
            label,
            DetectError::InferenceFailure(format!("image worker panicked: {}", join_err)),
            ImageTiming { total: started.elapsed(), ..Default::default() },
        ),
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            log::warn!(
                "[{}] {} exceeded {}; abandoning its worker, which may still be running",
                run_id,
                label,
                format_duration(config.image_timeout)
            );
            ImageDetectionResult::failure(
                label,
                DetectError::Timeout(config.image_timeout),
                ImageTiming { total: started.elapsed(), ..Default::default() },
            )
        }
    }
}

/// Runs one image through every stage on the calling thread.
fn process_one_image<E: InferenceEngine>(
    engine: &SharedEngine<E>,
    source: &ImageSource,
    label: String,
    model: &ModelConfig,
    skip_visualization: bool,
    cancel: &AtomicBool,
) -> ImageDetectionResult {
    let mut timer = TimeCalc::start();
    match detect_and_annotate(engine, source, model, skip_visualization, cancel, &mut timer) {
        Ok((detections, annotated)) => ImageDetectionResult::success(label, detections, annotated, timer.finish()),
        Err(e) => ImageDetectionResult::failure(label, e, timer.finish()),
    }
}

fn detect_and_annotate<E: InferenceEngine>(
    engine: &SharedEngine<E>,
    source: &ImageSource,
    model: &ModelConfig,
    skip_visualization: bool,
    cancel: &AtomicBool,
    timer: &mut TimeCalc,
) -> Result<(Vec<Detection>, Option<AnnotatedImage>), DetectError> {
    let check_cancelled = |timer: &TimeCalc| {
        if cancel.load(Ordering::Relaxed) {
            log::debug!("Abandoned image stopped after {}", format_duration(timer.elapsed()));
            Err(DetectError::InferenceFailure("cancelled after timeout".to_string()))
        } else {
            Ok(())
        }
    };

    let (pre, original) = preprocess_image(source, model.input_width, model.input_height)?;
    timer.lap(Stage::Preprocess);
    check_cancelled(&*timer)?;

    let raw = engine.lock().run_inference(&pre.tensor)?;
    timer.lap(Stage::Inference);
    check_cancelled(&*timer)?;

    let detections = postprocess(&raw, &pre, model)?;
    timer.lap(Stage::Postprocess);
    check_cancelled(&*timer)?;

    let annotated = if skip_visualization {
        None
    } else {
        match annotate(&original, &detections, EncodedFormat::default()) {
            Ok(img) => Some(img),
            Err(e) => {
                log::warn!("Visualization failed, keeping detections without an annotated image: {}", e);
                None
            }
        }
    };
    timer.lap(Stage::Visualization);

    Ok((detections, annotated))
}

/// Counts per class and finds the single most confident detection across all
/// successful images. Ties keep the earliest detection.
pub fn aggregate_results(results: &[ImageDetectionResult]) -> DetectionSummary {
    let mut summary = DetectionSummary::default();
    let mut confidence_sum = 0.0f32;

    for (image_index, result) in results.iter().enumerate() {
        for det in result.detections() {
            *summary.by_class.entry(det.class_name.clone()).or_insert(0) += 1;
            summary.total_count += 1;
            confidence_sum += det.confidence;

            let higher = summary
                .highest_confidence
                .as_ref()
                .map_or(true, |best| det.confidence > best.confidence);
            if higher {
                summary.highest_confidence = Some(det.clone());
                summary.highest_confidence_image_index = Some(image_index);
            }
        }
    }

    if summary.total_count > 0 {
        summary.average_confidence = confidence_sum / summary.total_count as f32;
    }
    summary
}

/// Runs a single image and returns its result.
pub async fn process_image<E: InferenceEngine + 'static>(
    engine: &SharedEngine<E>,
    source: impl Into<ImageSource>,
    config: &PipelineConfig,
) -> Result<ImageDetectionResult, DetectError> {
    let result = run_pipeline(engine, vec![source.into()], config, None).await?;
    result
        .results
        .into_iter()
        .next()
        .ok_or(DetectError::NoImages)
}

/// True when the image was analyzed and at least one wound was found. Skips annotation.
pub async fn has_detections<E: InferenceEngine + 'static>(
    engine: &SharedEngine<E>,
    source: impl Into<ImageSource>,
    config: &PipelineConfig,
) -> Result<bool, DetectError> {
    let config = config.clone().with_skip_visualization(true);
    let result = process_image(engine, source, &config).await?;
    Ok(!result.detections().is_empty())
}
