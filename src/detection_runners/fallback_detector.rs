use crate::common::ModelConfig;
use crate::detection_runners::inference_process::InferenceEngine;
use crate::error::DetectError;

/// Uses `primary` when it loads, otherwise `secondary`.
///
/// The switch happens only at load time and only on [`DetectError::ModelUnavailable`];
/// per-call failures of the active engine are returned as they are.
#[derive(Debug)]
pub struct FallbackEngine<P, S> {
    primary: P,
    secondary: S,
    using_secondary: bool,
}

impl<P: InferenceEngine, S: InferenceEngine> FallbackEngine<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self {
            primary,
            secondary,
            using_secondary: false,
        }
    }

    pub fn is_using_fallback(&self) -> bool {
        self.using_secondary
    }

    fn active(&mut self) -> &mut dyn InferenceEngine {
        if self.using_secondary {
            &mut self.secondary
        } else {
            &mut self.primary
        }
    }
}

impl<P: InferenceEngine, S: InferenceEngine> InferenceEngine for FallbackEngine<P, S> {
    fn load_model(&mut self) -> Result<(), DetectError> {
        match self.primary.load_model() {
            Ok(()) => {
                self.using_secondary = false;
                Ok(())
            }
            Err(DetectError::ModelUnavailable(reason)) => {
                log::warn!(
                    "{} engine unavailable ({}), falling back to {}",
                    self.primary.name(),
                    reason,
                    self.secondary.name()
                );
                self.secondary.load_model()?;
                self.using_secondary = true;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn is_loaded(&self) -> bool {
        if self.using_secondary {
            self.secondary.is_loaded()
        } else {
            self.primary.is_loaded()
        }
    }

    fn run_inference(&mut self, tensor: &[f32]) -> Result<Vec<f32>, DetectError> {
        self.active().run_inference(tensor)
    }

    fn model_config(&self) -> &ModelConfig {
        if self.using_secondary {
            self.secondary.model_config()
        } else {
            self.primary.model_config()
        }
    }

    fn unload(&mut self) {
        self.primary.unload();
        self.secondary.unload();
        self.using_secondary = false;
    }

    fn name(&self) -> &str {
        if self.using_secondary {
            self.secondary.name()
        } else {
            self.primary.name()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ConfigOrt;
    use crate::detection_runners::{MockEngine, OrtEngine};

    #[test]
    fn falls_back_when_primary_cannot_load() {
        let model = ModelConfig::default();
        let mut engine = FallbackEngine::new(
            OrtEngine::new(ConfigOrt::new(), model.clone()),
            MockEngine::new(model.clone()),
        );
        assert_eq!(engine.ensure_loaded().map(|_| ()), Ok(()));
        assert!(engine.is_using_fallback());
        assert_eq!(engine.name(), "mock");

        let raw = engine.run_inference(&vec![0.0; model.expected_input_len()]).unwrap();
        assert_eq!(raw.len(), model.expected_output_len());
    }
}
