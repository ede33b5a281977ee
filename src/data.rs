mod config_ort;
mod config_pipeline;
mod pipeline_result;
mod progress;
mod time_calc;

pub use config_ort::ConfigOrt;
pub use config_pipeline::PipelineConfig;
pub use pipeline_result::*;
pub use progress::{PipelineProgress, PipelineStage};
pub use time_calc::{ImageTiming, Stage, TimeCalc};
