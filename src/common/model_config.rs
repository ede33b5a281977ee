use std::path::Path;

use serde::{Deserialize, Serialize};
use crate::error::DetectError;
use crate::utils;

/// Strides of the detector heads; each contributes `(w / s) * (h / s)` anchors.
const DETECTOR_STRIDES: [usize; 3] = [8, 16, 32];

/// Number of box channels in front of the class probabilities.
pub const BOX_FEATURES: usize = 4;

/// Geometry and thresholds of the loaded detector.
///
/// Immutable for the duration of a run. The class list must match the output
/// layout of the model, `4 + num_classes` features per prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub class_names: Vec<String>,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_width: 640,
            input_height: 640,
            class_names: vec!["abrasion".to_string(), "bruise".to_string(), "cut".to_string()],
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
        }
    }
}

impl ModelConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
        self.input_width = width;
        self.input_height = height;
        self
    }

    pub fn with_class_names(mut self, names: &[&str]) -> Self {
        self.class_names = names.iter().map(|x| x.to_string()).collect::<Vec<String>>();
        self
    }

    /// Reads one class name per line, skipping blank lines.
    pub fn with_labels_file<P: AsRef<Path>>(mut self, path: P) -> anyhow::Result<Self> {
        let names: Vec<String> = utils::file_to_vec(path.as_ref())?
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if names.is_empty() {
            anyhow::bail!("Labels file {} contains no class names", path.as_ref().display());
        }
        self.class_names = names;
        Ok(self)
    }

    pub fn with_confidence_threshold(mut self, x: f32) -> Self {
        self.confidence_threshold = x;
        self
    }

    pub fn with_iou_threshold(mut self, x: f32) -> Self {
        self.iou_threshold = x;
        self
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Features per prediction: 4 box values plus one probability per class.
    pub fn num_features(&self) -> usize {
        BOX_FEATURES + self.num_classes()
    }

    /// Anchor count for the configured input size (8400 at 640x640).
    pub fn num_predictions(&self) -> usize {
        let (w, h) = (self.input_width as usize, self.input_height as usize);
        DETECTOR_STRIDES.iter().map(|s| (w / s) * (h / s)).sum()
    }

    /// Length of the `[1, 3, H, W]` input tensor.
    pub fn expected_input_len(&self) -> usize {
        3 * self.input_width as usize * self.input_height as usize
    }

    /// Length of the `[1, 4 + nc, N]` output tensor.
    pub fn expected_output_len(&self) -> usize {
        self.num_features() * self.num_predictions()
    }

    /// Name for `class_id`, or `class_<id>` when the list is shorter than the model.
    pub fn class_name(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    pub fn validate(&self) -> Result<(), DetectError> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(DetectError::InvalidConfig(format!(
                "model input size must be non-zero, got {}x{}",
                self.input_width, self.input_height
            )));
        }
        if self.class_names.is_empty() {
            return Err(DetectError::InvalidConfig("at least one class name is required".to_string()));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DetectError::InvalidConfig(format!(
                "confidence threshold {} is outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(DetectError::InvalidConfig(format!(
                "IoU threshold {} is outside [0, 1]",
                self.iou_threshold
            )));
        }
        Ok(())
    }

    pub fn to_string(&self) -> String {
        format!("Model Input Resolution: {}x{}\n\
        Classes ({}): {}\n\
        Output Layout: [1, {}, {}]\n\
        Confidence Threshold: {}\n\
        IoU Threshold: {}",
                self.input_width, self.input_height,
                self.num_classes(), self.class_names.join(", "),
                self.num_features(), self.num_predictions(),
                self.confidence_threshold, self.iou_threshold)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_geometry_matches_production_model() {
        let config = ModelConfig::default();
        assert_eq!(config.num_classes(), 3);
        assert_eq!(config.num_features(), 7);
        assert_eq!(config.num_predictions(), 8400);
        assert_eq!(config.expected_input_len(), 3 * 640 * 640);
        assert_eq!(config.expected_output_len(), 7 * 8400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_class_ids_get_placeholder_names() {
        let config = ModelConfig::default();
        assert_eq!(config.class_name(2), "cut");
        assert_eq!(config.class_name(7), "class_7");
    }

    #[test]
    fn validate_rejects_bad_thresholds() {
        let config = ModelConfig::default().with_confidence_threshold(1.5);
        assert!(matches!(config.validate(), Err(DetectError::InvalidConfig(_))));

        let config = ModelConfig::default().with_class_names(&[]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn labels_file_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "abrasion\n\n  bruise  \ncut\n").unwrap();

        let config = ModelConfig::default().with_labels_file(file.path()).unwrap();
        assert_eq!(config.class_names, ["abrasion", "bruise", "cut"]);
    }

    #[test]
    fn empty_labels_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\n   \n").unwrap();
        assert!(ModelConfig::default().with_labels_file(file.path()).is_err());
        assert!(ModelConfig::default().with_labels_file("does/not/exist.txt").is_err());
    }
}
