use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::common::ModelConfig;

/// Run-level knobs for [`run_pipeline`](crate::pipeline::run_pipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Budget for one image, preprocessing through annotation.
    #[serde(with = "duration_ms")]
    pub image_timeout: Duration,
    /// Images beyond this count are dropped with a warning.
    pub max_images: usize,
    /// Keep going after an image fails.
    pub continue_on_error: bool,
    /// Skip drawing annotated images.
    pub skip_visualization: bool,
    /// Overrides [`ModelConfig::confidence_threshold`] for this run.
    pub confidence_threshold: Option<f32>,
    /// Overrides [`ModelConfig::iou_threshold`] for this run.
    pub iou_threshold: Option<f32>,
    /// Tag for log lines; generated when absent.
    pub log_prefix: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_timeout: Duration::from_secs(30),
            max_images: 10,
            continue_on_error: true,
            skip_visualization: false,
            confidence_threshold: None,
            iou_threshold: None,
            log_prefix: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("Failed to parse pipeline config")
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn with_image_timeout(mut self, timeout: Duration) -> Self {
        self.image_timeout = timeout;
        self
    }

    pub fn with_max_images(mut self, n: usize) -> Self {
        self.max_images = n;
        self
    }

    pub fn with_continue_on_error(mut self, x: bool) -> Self {
        self.continue_on_error = x;
        self
    }

    pub fn with_skip_visualization(mut self, x: bool) -> Self {
        self.skip_visualization = x;
        self
    }

    pub fn with_confidence_threshold(mut self, x: f32) -> Self {
        self.confidence_threshold = Some(x);
        self
    }

    pub fn with_iou_threshold(mut self, x: f32) -> Self {
        self.iou_threshold = Some(x);
        self
    }

    pub fn with_log_prefix(mut self, prefix: &str) -> Self {
        self.log_prefix = Some(prefix.to_string());
        self
    }

    /// The model config with this run's threshold overrides applied.
    pub fn effective_model_config(&self, model: &ModelConfig) -> ModelConfig {
        let mut config = model.clone();
        if let Some(conf) = self.confidence_threshold {
            config.confidence_threshold = conf;
        }
        if let Some(iou) = self.iou_threshold {
            config.iou_threshold = iou;
        }
        config
    }
}

mod duration_ms {
    use std::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.image_timeout, Duration::from_secs(30));
        assert_eq!(config.max_images, 10);
        assert!(config.continue_on_error);
        assert!(!config.skip_visualization);
    }

    #[test]
    fn json_overrides_only_named_fields() {
        let config = PipelineConfig::from_json_str(
            r#"{ "imageTimeout": 1500, "maxImages": 3, "confidenceThreshold": 0.6 }"#,
        )
        .unwrap();
        assert_eq!(config.image_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_images, 3);
        assert_eq!(config.confidence_threshold, Some(0.6));
        assert!(config.continue_on_error);
    }

    #[test]
    fn overrides_apply_to_model_config() {
        let model = ModelConfig::default();
        let config = PipelineConfig::new().with_iou_threshold(0.3);
        let effective = config.effective_model_config(&model);
        assert_eq!(effective.iou_threshold, 0.3);
        assert_eq!(effective.confidence_threshold, model.confidence_threshold);
    }

    #[test]
    fn loads_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{ "continueOnError": false, "skipVisualization": true, "logPrefix": "ward-3" }"#).unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert!(!config.continue_on_error);
        assert!(config.skip_visualization);
        assert_eq!(config.log_prefix.as_deref(), Some("ward-3"));
        assert_eq!(config.max_images, 10);

        assert!(PipelineConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(PipelineConfig::from_json_str("{ maxImages: }").is_err());
    }
}
