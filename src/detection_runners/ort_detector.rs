mod ort_engine;
pub mod image_ops;
pub mod nms;
pub mod postprocess;

pub use ort_engine::*;
