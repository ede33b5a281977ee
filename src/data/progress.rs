use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    LoadingModel,
    ProcessingImage,
    ImageComplete,
    Complete,
    Error,
}

/// Progress event handed to the caller's callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineProgress {
    pub stage: PipelineStage,
    pub current_image_index: usize,
    pub total_images: usize,
    pub percent_complete: u8,
    pub message: String,
}

impl PipelineProgress {
    pub fn new(stage: PipelineStage, current_image_index: usize, total_images: usize, message: String) -> Self {
        Self {
            stage,
            current_image_index,
            total_images,
            percent_complete: Self::percent(stage, current_image_index, total_images),
            message,
        }
    }

    /// 5% once the model loads, 10..95% across images, 100% at the end.
    fn percent(stage: PipelineStage, index: usize, total: usize) -> u8 {
        match stage {
            PipelineStage::LoadingModel => 5,
            PipelineStage::Complete => 100,
            PipelineStage::Error => 0,
            PipelineStage::ProcessingImage | PipelineStage::ImageComplete => {
                let done = match stage {
                    PipelineStage::ImageComplete => index + 1,
                    _ => index,
                };
                let total = total.max(1) as f32;
                (10. + (done.min(total as usize) as f32 / total) * 85.).round() as u8
            }
        }
    }
}
