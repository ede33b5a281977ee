pub mod fallback_detector;
pub mod inference_process;
pub mod mock_detector;
pub mod ort_detector;

pub use fallback_detector::FallbackEngine;
pub use inference_process::{shared, InferenceEngine, SharedEngine};
pub use mock_detector::MockEngine;
pub use ort_detector::*;
