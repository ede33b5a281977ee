//! Draws detection boxes on a copy of the source photo.
//!
//! Only rectangles are drawn; labels and confidences travel as structured data in
//! each [`Detection`] so the caller can render its own overlay.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use crate::common::Detection;
use crate::data::{AnnotatedImage, EncodedFormat};
use crate::error::DetectError;

pub const BOX_THICKNESS: i32 = 3;

pub const HIGH_CONFIDENCE: f32 = 0.8;
pub const MEDIUM_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn of(confidence: f32) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            ConfidenceTier::High
        } else if confidence >= MEDIUM_CONFIDENCE {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn colour(&self) -> Rgb<u8> {
        match self {
            ConfidenceTier::High => Rgb([0, 255, 0]),     // green
            ConfidenceTier::Medium => Rgb([255, 165, 0]), // orange
            ConfidenceTier::Low => Rgb([255, 0, 0]),      // red
        }
    }
}

/// Draws every detection onto `image` in place. Returns how many were drawn,
/// which is zero for an image without area.
pub fn draw_detections(image: &mut RgbImage, detections: &[Detection]) -> usize {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
        return 0;
    }
    let mut drawn = 0;

    for det in detections {
        let (x1, y1, x2, y2) = det.box_corners().as_x1y1_x2y2_i32();
        let colour = ConfidenceTier::of(det.confidence).colour();

        for t in 0..BOX_THICKNESS {
            let (left, top) = ((x1 + t).clamp(0, w - 1), (y1 + t).clamp(0, h - 1));
            let (right, bottom) = ((x2 - 1 - t).clamp(0, w - 1), (y2 - 1 - t).clamp(0, h - 1));
            if right < left || bottom < top {
                break;
            }
            let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
            draw_hollow_rect_mut(image, rect, colour);
        }
        drawn += 1;
    }
    drawn
}

/// Draws `detections` on a copy of `original` and encodes the result.
pub fn annotate(original: &RgbImage, detections: &[Detection], format: EncodedFormat) -> Result<AnnotatedImage, DetectError> {
    let mut canvas = original.clone();
    let drawn = draw_detections(&mut canvas, detections);

    let (width, height) = canvas.dimensions();
    let image_format = match format {
        EncodedFormat::Jpeg => ImageFormat::Jpeg,
        EncodedFormat::Png => ImageFormat::Png,
    };

    let mut bytes = Vec::new();
    DynamicImage::from(canvas)
        .write_to(&mut Cursor::new(&mut bytes), image_format)
        .map_err(|e| DetectError::InvalidImage(format!("Failed to encode annotated image: {}", e)))?;

    log::debug!("Annotated {}x{} image with {} boxes ({} bytes)", width, height, drawn, bytes.len());

    Ok(AnnotatedImage {
        bytes,
        width,
        height,
        format,
        detections_drawn: drawn,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_split_at_thresholds() {
        assert_eq!(ConfidenceTier::of(0.95), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::of(0.8), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::of(0.6), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::of(0.3), ConfidenceTier::Low);
    }

    #[test]
    fn draws_on_a_copy_only() {
        let original = RgbImage::from_pixel(40, 30, Rgb([0, 0, 0]));
        let det = Detection::default()
            .with_x1y1_x2y2(5., 5., 25., 20.)
            .with_confidence(0.9);

        let annotated = annotate(&original, &[det], EncodedFormat::Png).unwrap();
        assert_eq!(original.get_pixel(5, 5), &Rgb([0, 0, 0]));
        assert_eq!((annotated.width, annotated.height), (40, 30));
        assert_eq!(annotated.detections_drawn, 1);

        let decoded = image::load_from_memory(&annotated.bytes).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(5, 5), &Rgb([0, 255, 0]));
        assert_eq!(decoded.get_pixel(7, 10), &Rgb([0, 255, 0]));
        assert_eq!(decoded.get_pixel(15, 12), &Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_past_the_edge_are_clipped() {
        let mut img = RgbImage::new(10, 10);
        let det = Detection::default().with_x1y1_x2y2(-5., -5., 30., 30.).with_confidence(0.2);
        assert_eq!(draw_detections(&mut img, &[det]), 1);
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn empty_canvas_draws_nothing() {
        let det = Detection::default().with_x1y1_x2y2(0., 0., 5., 5.).with_confidence(0.9);
        assert_eq!(draw_detections(&mut RgbImage::new(0, 10), &[det.clone()]), 0);
        assert_eq!(draw_detections(&mut RgbImage::new(10, 0), &[det]), 0);
    }

    #[test]
    fn jpeg_is_the_default_encoding() {
        let img = RgbImage::new(16, 16);
        let annotated = annotate(&img, &[], EncodedFormat::default()).unwrap();
        assert_eq!(image::guess_format(&annotated.bytes).unwrap(), ImageFormat::Jpeg);
    }
}
