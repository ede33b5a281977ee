//! ONNX Runtime backend for [`InferenceEngine`].

use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::Result;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use regex::Regex;
use crate::common::ModelConfig;
use crate::data::ConfigOrt;
use crate::detection_runners::inference_process::{check_output_shape, validate_input, InferenceEngine};
use crate::error::DetectError;

#[derive(Debug)]
pub struct OrtEngine {
    config: ConfigOrt,
    model: ModelConfig,
    session: Option<Session>,
    input_name: String,
    output_name: String,
}

impl OrtEngine {
    pub fn new(config: ConfigOrt, model: ModelConfig) -> Self {
        Self {
            config,
            model,
            session: None,
            input_name: String::new(),
            output_name: String::new(),
        }
    }

    fn build_session(&self) -> Result<Session> {
        if !self.config.ort_lib_path.is_empty() {
            let committed = ort::init_from(&self.config.ort_lib_path).commit();
            log::debug!("ORT environment from {}: {:?}", self.config.ort_lib_path, committed);
        }

        let level = match self.config.optimization_level {
            0 => GraphOptimizationLevel::Disable,
            1 => GraphOptimizationLevel::Level1,
            2 => GraphOptimizationLevel::Level2,
            _ => GraphOptimizationLevel::Level3,
        };

        let session = Session::builder()?
            .with_optimization_level(level)?
            .with_intra_threads(self.config.intra_threads)?
            .commit_from_file(&self.config.onnx_path)?;
        Ok(session)
    }

    /// Class names from the model metadata.
    /// String format: `{0: 'abrasion', 1: 'bruise', 2: 'cut'}`
    fn fetch_names(session: &Session) -> Option<Vec<String>> {
        let names = session.metadata().ok()?.custom("names").ok()??;
        let re = Regex::new(r#"(['"])([-()\w '"]+)(['"])"#).ok()?;
        let mut names_ = vec![];
        for (_, [_, name, _]) in re.captures_iter(&names).map(|x| x.extract()) {
            names_.push(name.to_string());
        }
        Some(names_)
    }

    fn dry_run(&mut self) -> Result<(), DetectError> {
        let zeros = vec![0.0f32; self.model.expected_input_len()];
        for _ in 0..self.config.num_dry_run {
            self.run_inference(&zeros)?;
        }
        Ok(())
    }
}

impl InferenceEngine for OrtEngine {
    fn load_model(&mut self) -> Result<(), DetectError> {
        if self.config.onnx_path.is_empty() {
            return Err(DetectError::ModelUnavailable("no model path configured".to_string()));
        }

        // A missing ONNX Runtime library panics inside `ort` instead of returning an error.
        let session = match catch_unwind(AssertUnwindSafe(|| self.build_session())) {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(DetectError::ModelUnavailable(format!("{:#}", e))),
            Err(_) => {
                return Err(DetectError::ModelUnavailable(
                    "ONNX Runtime could not be initialized on this platform".to_string(),
                ))
            }
        };

        let (input_name, output_name) = match (session.inputs.first(), session.outputs.first()) {
            (Some(input), Some(output)) => (input.name.clone(), output.name.clone()),
            _ => return Err(DetectError::ModelUnavailable("model has no inputs or outputs".to_string())),
        };
        if session.outputs.len() > 1 {
            log::warn!("Model has {} outputs, only '{}' is used", session.outputs.len(), output_name);
        }

        match Self::fetch_names(&session) {
            Some(names) if names != self.model.class_names => log::warn!(
                "Class names in model metadata {:?} differ from configured {:?}",
                names,
                self.model.class_names
            ),
            _ => {}
        }

        log::info!(
            "Backend: ONNXRuntime | Model: {} | Input: '{}' | Output: '{}'\n{}",
            self.config.onnx_path,
            input_name,
            output_name,
            self.model.to_string()
        );

        self.session = Some(session);
        self.input_name = input_name;
        self.output_name = output_name;

        if let Err(e) = self.dry_run() {
            self.unload();
            return Err(DetectError::ModelUnavailable(format!("dry run failed: {}", e)));
        }
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    fn run_inference(&mut self, tensor: &[f32]) -> Result<Vec<f32>, DetectError> {
        validate_input(tensor, &self.model)?;

        let (w, h) = (self.model.input_width as usize, self.model.input_height as usize);
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| DetectError::InferenceFailure("model not loaded".to_string()))?;

        let input = Tensor::from_array(([1usize, 3, h, w], tensor.to_vec().into_boxed_slice()))
            .map_err(|e| DetectError::InferenceFailure(format!("Failed to create input tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| DetectError::InferenceFailure(e.to_string()))?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::InferenceFailure(format!("Failed to extract output '{}': {}", self.output_name, e)))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        check_output_shape(&dims, &self.model);

        Ok(data.to_vec())
    }

    fn model_config(&self) -> &ModelConfig {
        &self.model
    }

    fn unload(&mut self) {
        if self.session.take().is_some() {
            log::info!("Unloaded ONNX model {}", self.config.onnx_path);
        }
    }

    fn name(&self) -> &str {
        "onnxruntime"
    }
}
