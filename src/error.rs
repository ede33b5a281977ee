use std::time::Duration;

use thiserror::Error;

/// Failures raised by the detection pipeline.
///
/// `InvalidImage`, `SizeMismatch`, `InferenceFailure` and `Timeout` are local to a
/// single image and end up inside that image's result. `ModelUnavailable`, `NoImages`
/// and `InvalidConfig` abort a whole run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectError {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("tensor size mismatch: expected {expected} values, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("inference failed: {0}")]
    InferenceFailure(String),

    #[error("image processing timed out after {0:?}")]
    Timeout(Duration),

    #[error("no images provided to pipeline")]
    NoImages,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DetectError {
    /// True for errors that stop the whole run rather than a single image.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DetectError::ModelUnavailable(_) | DetectError::NoImages | DetectError::InvalidConfig(_)
        )
    }
}

impl From<image::ImageError> for DetectError {
    fn from(err: image::ImageError) -> Self {
        DetectError::InvalidImage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_run_level_errors_are_fatal() {
        assert!(DetectError::ModelUnavailable("x".to_string()).is_fatal());
        assert!(DetectError::NoImages.is_fatal());
        assert!(DetectError::InvalidConfig("x".to_string()).is_fatal());

        assert!(!DetectError::InvalidImage("x".to_string()).is_fatal());
        assert!(!DetectError::SizeMismatch { expected: 1, actual: 2 }.is_fatal());
        assert!(!DetectError::InferenceFailure("x".to_string()).is_fatal());
        assert!(!DetectError::Timeout(Duration::from_secs(1)).is_fatal());
    }
}
