use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Serializer};
use crate::common::{Detection, ModelConfig};
use crate::data::ImageTiming;
use crate::error::DetectError;

/// Encoding used for annotated images.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodedFormat {
    #[default]
    Jpeg,
    Png,
}

/// Copy of the source photo with the detections drawn on it, already encoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedImage {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: EncodedFormat,
    pub detections_drawn: usize,
}

/// Success or failure of one image, tagged so the two cannot be mixed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ImageOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        detections: Vec<Detection>,
        annotated_image: Option<AnnotatedImage>,
    },
    Failure {
        #[serde(serialize_with = "error_as_string")]
        error: DetectError,
    },
}

/// Result of running one image through the pipeline. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetectionResult {
    pub source: String,
    pub outcome: ImageOutcome,
    pub timing: ImageTiming,
}

impl ImageDetectionResult {
    pub fn success(source: String, detections: Vec<Detection>, annotated_image: Option<AnnotatedImage>, timing: ImageTiming) -> Self {
        Self {
            source,
            outcome: ImageOutcome::Success { detections, annotated_image },
            timing,
        }
    }

    pub fn failure(source: String, error: DetectError, timing: ImageTiming) -> Self {
        Self {
            source,
            outcome: ImageOutcome::Failure { error },
            timing,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ImageOutcome::Success { .. })
    }

    /// Detections of a successful image; empty for a failed one.
    pub fn detections(&self) -> &[Detection] {
        match &self.outcome {
            ImageOutcome::Success { detections, .. } => detections,
            ImageOutcome::Failure { .. } => &[],
        }
    }

    pub fn annotated_image(&self) -> Option<&AnnotatedImage> {
        match &self.outcome {
            ImageOutcome::Success { annotated_image, .. } => annotated_image.as_ref(),
            ImageOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&DetectError> {
        match &self.outcome {
            ImageOutcome::Success { .. } => None,
            ImageOutcome::Failure { error } => Some(error),
        }
    }
}

/// Counts and extremes over every detection of a run.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSummary {
    pub by_class: BTreeMap<String, usize>,
    pub total_count: usize,
    pub highest_confidence: Option<Detection>,
    pub highest_confidence_image_index: Option<usize>,
    pub average_confidence: f32,
}

/// Aggregate of one [`run_pipeline`](crate::pipeline::run_pipeline) call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub results: Vec<ImageDetectionResult>,
    pub total_detections: usize,
    pub successful_images: usize,
    pub failed_images: usize,
    pub summary: DetectionSummary,
    pub input_image_count: usize,
    pub model_load_time: Duration,
    pub total_processing_time: Duration,
    pub model_config: ModelConfig,
}

impl PipelineResult {
    /// Every detection of every successful image, in image order.
    pub fn all_detections(&self) -> impl Iterator<Item = &Detection> {
        self.results.iter().flat_map(|r| r.detections().iter())
    }
}

fn error_as_string<S: Serializer>(error: &DetectError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}
