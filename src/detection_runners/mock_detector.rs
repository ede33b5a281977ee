use crate::common::ModelConfig;
use crate::detection_runners::inference_process::{validate_input, InferenceEngine};
use crate::error::DetectError;

/// Confidence of the synthetic candidate.
pub const MOCK_CONFIDENCE: f32 = 0.85;

/// Stand-in detector for platforms without a usable inference runtime.
///
/// Emits one candidate per pass: a box centered in the model input, at most
/// 320x240 and at most half the input, classified as class 0. Everything else in
/// the buffer is zero, so it flows through the normal postprocessing path.
#[derive(Debug, Clone)]
pub struct MockEngine {
    model: ModelConfig,
    loaded: bool,
}

impl MockEngine {
    pub fn new(model: ModelConfig) -> Self {
        Self { model, loaded: false }
    }

    fn synthetic_output(&self) -> Vec<f32> {
        let n = self.model.num_predictions();
        let mut raw = vec![0.0f32; self.model.expected_output_len()];
        if n == 0 {
            return raw;
        }

        let (w, h) = (self.model.input_width as f32, self.model.input_height as f32);
        let values = [w / 2., h / 2., (w / 2.).min(320.), (h / 2.).min(240.), MOCK_CONFIDENCE];
        for (feature, v) in values.iter().enumerate() {
            raw[feature * n] = *v;
        }
        raw
    }
}

impl InferenceEngine for MockEngine {
    fn load_model(&mut self) -> Result<(), DetectError> {
        self.loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn run_inference(&mut self, tensor: &[f32]) -> Result<Vec<f32>, DetectError> {
        if !self.loaded {
            return Err(DetectError::InferenceFailure("model not loaded".to_string()));
        }
        validate_input(tensor, &self.model)?;
        Ok(self.synthetic_output())
    }

    fn model_config(&self) -> &ModelConfig {
        &self.model
    }

    fn unload(&mut self) {
        self.loaded = false;
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection_runners::ort_detector::postprocess::parse_output;

    #[test]
    fn emits_one_centered_candidate() {
        let model = ModelConfig::default();
        let mut engine = MockEngine::new(model.clone());
        engine.load_model().unwrap();

        let raw = engine.run_inference(&vec![0.0; model.expected_input_len()]).unwrap();
        let dets = parse_output(&raw, &model).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 0);
        assert_eq!(dets[0].confidence, MOCK_CONFIDENCE);
        assert_eq!((dets[0].bbox.x, dets[0].bbox.y), (320., 320.));
        assert_eq!((dets[0].bbox.width, dets[0].bbox.height), (320., 240.));
    }

    #[test]
    fn requires_load() {
        let mut engine = MockEngine::new(ModelConfig::default());
        assert!(engine.run_inference(&[]).is_err());
    }
}
