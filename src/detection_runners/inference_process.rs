use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use crate::common::ModelConfig;
use crate::error::DetectError;

/// Anything that can turn a `[1, 3, H, W]` tensor into a `[1, 4 + nc, N]` output buffer.
///
/// The pipeline only talks to this trait, so the ONNX Runtime engine, the mock
/// detector, or a test double can be swapped in without touching downstream code.
pub trait InferenceEngine: Send {
    /// Loads the model weights. Fails with [`DetectError::ModelUnavailable`] when the
    /// runtime or model cannot be initialized.
    fn load_model(&mut self) -> Result<(), DetectError>;

    fn is_loaded(&self) -> bool;

    /// Runs one forward pass and returns the flat output buffer.
    fn run_inference(&mut self, tensor: &[f32]) -> Result<Vec<f32>, DetectError>;

    /// Model geometry this engine was built for.
    fn model_config(&self) -> &ModelConfig;

    /// Releases the model. Loading again is allowed.
    fn unload(&mut self) {}

    fn name(&self) -> &str;

    /// Loads the model unless it already is. Returns the time spent loading.
    fn ensure_loaded(&mut self) -> Result<Duration, DetectError> {
        if self.is_loaded() {
            return Ok(Duration::ZERO);
        }
        let start = Instant::now();
        self.load_model()?;
        let elapsed = start.elapsed();
        log::info!("Loaded {} model in {:.2?}", self.name(), elapsed);
        Ok(elapsed)
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn load_model(&mut self) -> Result<(), DetectError> {
        (**self).load_model()
    }

    fn is_loaded(&self) -> bool {
        (**self).is_loaded()
    }

    fn run_inference(&mut self, tensor: &[f32]) -> Result<Vec<f32>, DetectError> {
        (**self).run_inference(tensor)
    }

    fn model_config(&self) -> &ModelConfig {
        (**self).model_config()
    }

    fn unload(&mut self) {
        (**self).unload()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Engine handle shared by the pipeline and its blocking workers.
pub type SharedEngine<E> = Arc<Mutex<E>>;

pub fn shared<E: InferenceEngine>(engine: E) -> SharedEngine<E> {
    Arc::new(Mutex::new(engine))
}

/// Checks the `1 * 3 * W * H` input length every engine expects.
pub fn validate_input(tensor: &[f32], config: &ModelConfig) -> Result<(), DetectError> {
    let expected = config.expected_input_len();
    if tensor.len() != expected {
        return Err(DetectError::SizeMismatch { expected, actual: tensor.len() });
    }
    Ok(())
}

/// Warns when an output shape diverges from `[1, 4 + nc, N]`. Never fails.
pub fn check_output_shape(shape: &[usize], config: &ModelConfig) -> bool {
    let expected = [1, config.num_features(), config.num_predictions()];
    let matches = shape == &expected[..];
    if !matches {
        log::warn!("Output shape mismatch! Expected: {:?}, got: {:?}", expected, shape);
    }
    matches
}
