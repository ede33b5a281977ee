mod utils;
pub mod common;
pub mod context_formatter;
pub mod data;
pub mod detection_runners;
pub mod error;
pub mod pipeline;
pub mod visualizer;

use crate::common::ModelConfig;
use crate::data::ConfigOrt;
use crate::detection_runners::{shared, InferenceEngine, OrtEngine, SharedEngine};

pub use crate::common::{BoundingBox, Detection, ImageSource};
pub use crate::context_formatter::{format_for_llm, has_context};
pub use crate::data::{PipelineConfig, PipelineProgress, PipelineResult, PipelineStage};
pub use crate::error::DetectError;
pub use crate::pipeline::{aggregate_results, has_detections, process_image, run_pipeline};
pub use crate::visualizer::annotate;

pub type Result<T, E = DetectError> = std::result::Result<T, E>;

/// Builds an ONNX Runtime engine and loads it right away, so load problems surface
/// here instead of on the first pipeline run.
pub fn init_detector(config: ConfigOrt, model: ModelConfig) -> Result<SharedEngine<OrtEngine>> {
    model.validate()?;
    log::info!("Initializing ORT session for {}", config.onnx_path);
    let mut engine = OrtEngine::new(config, model);
    engine.ensure_loaded()?;
    Ok(shared(engine))
}
