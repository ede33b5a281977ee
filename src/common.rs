mod image_source;
mod model_config;
mod wound_box;
mod wound_detection;

pub use image_source::*;
pub use model_config::*;
pub use wound_box::*;
pub use wound_detection::*;
