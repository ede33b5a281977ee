//! Letterbox preprocessing: image to `[1, 3, H, W]` planar float tensor.

use fast_image_resize::{
    images::{CroppedImageMut, Image as FirImage, ImageRef},
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;
use rayon::prelude::*;
use serde::Serialize;
use crate::common::ImageSource;
use crate::error::DetectError;

/// Gray used for the letterbox borders.
pub const PAD_VALUE: u8 = 128;

/// How a source image maps into the model input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterboxParams {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub new_width: u32,
    pub new_height: u32,
}

/// Preprocessed tensor plus what is needed to map boxes back to the source image.
///
/// `scale > 0` and `0 <= pad_x, pad_y <` the model input dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessResult {
    pub tensor: Vec<f32>,
    pub original_width: u32,
    pub original_height: u32,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

/// Scale that fits `src` inside `target` and the padding that centers it.
///
/// Only the shorter axis is padded, split evenly across both sides.
pub fn letterbox_params(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> LetterboxParams {
    let scale = (target_w as f32 / src_w as f32).min(target_h as f32 / src_h as f32);
    let new_width = ((src_w as f32 * scale).round() as u32).clamp(1, target_w);
    let new_height = ((src_h as f32 * scale).round() as u32).clamp(1, target_h);

    LetterboxParams {
        scale,
        pad_x: (target_w - new_width) as f32 / 2.,
        pad_y: (target_h - new_height) as f32 / 2.,
        new_width,
        new_height,
    }
}

/// Decodes `source` and letterboxes it. Also hands back the decoded image so later
/// stages do not decode it twice.
pub fn preprocess_image(source: &ImageSource, target_w: u32, target_h: u32) -> Result<(PreprocessResult, RgbImage), DetectError> {
    let image = source.decode()?;
    let result = preprocess_rgb(&image, target_w, target_h)?;
    Ok((result, image))
}

pub fn preprocess_rgb(image: &RgbImage, target_w: u32, target_h: u32) -> Result<PreprocessResult, DetectError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(DetectError::InvalidImage(format!("image has zero area ({}x{})", width, height)));
    }

    let params = letterbox_params(width, height, target_w, target_h);
    log::debug!(
        "Letterbox {}x{} -> {}x{} | scale={:.4} | resized={}x{} | pad=({:.1}, {:.1})",
        width, height, target_w, target_h, params.scale,
        params.new_width, params.new_height, params.pad_x, params.pad_y
    );

    let padded = letterbox_image(image, &params, target_w, target_h, PAD_VALUE)?;
    let tensor = nchw_normalize_flat(&padded)?;

    let expected = 3 * target_w as usize * target_h as usize;
    if tensor.len() != expected {
        return Err(DetectError::SizeMismatch { expected, actual: tensor.len() });
    }

    Ok(PreprocessResult {
        tensor,
        original_width: width,
        original_height: height,
        scale: params.scale,
        pad_x: params.pad_x,
        pad_y: params.pad_y,
    })
}

fn letterbox_image<'a>(
    img: &RgbImage,
    params: &LetterboxParams,
    target_w: u32,
    target_h: u32,
    bg: u8,
) -> Result<FirImage<'a>, DetectError> {
    let src = ImageRef::new(img.width(), img.height(), img.as_raw(), PixelType::U8x3)
        .map_err(|e| DetectError::InvalidImage(format!("Failed to wrap source image: {}", e)))?;

    let mut padded = FirImage::from_vec_u8(
        target_w,
        target_h,
        vec![bg; (target_w * target_h * 3) as usize],
        PixelType::U8x3,
    )
    .map_err(|e| DetectError::InvalidImage(format!("Failed to allocate letterbox canvas: {}", e)))?;

    let left = params.pad_x.floor() as u32;
    let top = params.pad_y.floor() as u32;

    {
        let mut cropped = CroppedImageMut::new(&mut padded, left, top, params.new_width, params.new_height)
            .map_err(|e| DetectError::InvalidImage(format!("Invalid letterbox region: {}", e)))?;

        let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
        let mut resizer = Resizer::new();
        resizer
            .resize(&src, &mut cropped, &options)
            .map_err(|e| DetectError::InvalidImage(format!("Failed to resize image: {}", e)))?;
    }

    Ok(padded)
}

/// Interleaved RGB bytes to planar `[R..., G..., B...]` floats in `[0, 1]`.
fn nchw_normalize_flat(img: &FirImage) -> Result<Vec<f32>, DetectError> {
    let buf = img.buffer();
    let w = img.width() as usize;
    let h = img.height() as usize;

    if buf.len() != w * h * 3 {
        return Err(DetectError::SizeMismatch { expected: w * h * 3, actual: buf.len() });
    }

    let hw = w * h;
    let mut out = vec![0.0f32; buf.len()];
    if hw == 0 {
        return Ok(out);
    }

    out.par_chunks_mut(hw).enumerate().for_each(|(channel, plane)| {
        for (i, v) in plane.iter_mut().enumerate() {
            *v = buf[3 * i + channel] as f32 / 255.0;
        }
    });

    Ok(out)
}
