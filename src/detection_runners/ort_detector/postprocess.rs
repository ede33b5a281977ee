//! Raw detector output to detections on the original image: parse, NMS, rescale.

use ndarray::ArrayView2;
use rayon::prelude::*;
use crate::common::{BoundingBox, Detection, ModelConfig, BOX_FEATURES};
use crate::detection_runners::ort_detector::image_ops::PreprocessResult;
use crate::detection_runners::ort_detector::nms::apply_nms;
use crate::error::DetectError;

/// Feature-major view over a `[1, 4 + nc, N]` output buffer.
///
/// Feature `f` of prediction `i` lives at flat index `f * N + i`; every read of the
/// buffer goes through [`OutputView::get`].
#[derive(Debug, Clone, Copy)]
pub struct OutputView<'a> {
    view: ArrayView2<'a, f32>,
}

impl<'a> OutputView<'a> {
    pub fn new(raw: &'a [f32], num_features: usize, num_predictions: usize) -> Result<Self, DetectError> {
        let expected = num_features * num_predictions;
        if raw.len() != expected {
            return Err(DetectError::SizeMismatch { expected, actual: raw.len() });
        }
        let view = ArrayView2::from_shape((num_features, num_predictions), raw)
            .map_err(|e| DetectError::InferenceFailure(format!("Failed to view output buffer: {}", e)))?;
        Ok(Self { view })
    }

    pub fn num_features(&self) -> usize {
        self.view.nrows()
    }

    pub fn num_predictions(&self) -> usize {
        self.view.ncols()
    }

    #[inline]
    pub fn get(&self, feature: usize, prediction: usize) -> f32 {
        self.view[[feature, prediction]]
    }

    /// Center-form box of prediction `i` from feature slots 0..4.
    pub fn bbox(&self, i: usize) -> BoundingBox {
        BoundingBox::new(self.get(0, i), self.get(1, i), self.get(2, i), self.get(3, i))
    }

    /// Best class of prediction `i` as `(class_id, probability)`.
    ///
    /// The first class wins ties; NaN probabilities never win.
    pub fn best_class(&self, i: usize) -> (usize, f32) {
        let mut best = (0, 0.0f32);
        for c in 0..self.num_features() - BOX_FEATURES {
            let prob = self.get(BOX_FEATURES + c, i);
            if prob > best.1 {
                best = (c, prob);
            }
        }
        best
    }
}

/// Decodes every candidate whose best class probability reaches the confidence threshold.
///
/// Boxes stay in model-input pixel space. Output is in scan order.
pub fn parse_output(raw: &[f32], config: &ModelConfig) -> Result<Vec<Detection>, DetectError> {
    let output = OutputView::new(raw, config.num_features(), config.num_predictions())?;

    let detections: Vec<Detection> = (0..output.num_predictions())
        .into_par_iter()
        .filter_map(|i| {
            let (class_id, confidence) = output.best_class(i);
            if confidence < config.confidence_threshold {
                return None;
            }
            Some(Detection::new(
                output.bbox(i),
                class_id,
                &config.class_name(class_id),
                confidence.min(1.0),
            ))
        })
        .collect();

    log::debug!(
        "Parsed {} of {} candidates at confidence >= {}",
        detections.len(),
        output.num_predictions(),
        config.confidence_threshold
    );
    Ok(detections)
}

/// Undoes the letterbox: removes padding, divides by the scale, clips to the image.
pub fn scale_detections(detections: Vec<Detection>, pre: &PreprocessResult) -> Vec<Detection> {
    let (max_w, max_h) = (pre.original_width as f32, pre.original_height as f32);

    detections
        .into_iter()
        .map(|det| {
            let b = det.bbox;
            let real = BoundingBox::new(
                (b.x - pre.pad_x) / pre.scale,
                (b.y - pre.pad_y) / pre.scale,
                b.width / pre.scale,
                b.height / pre.scale,
            );
            det.with_bbox(real.clamp_to(max_w, max_h))
        })
        .collect()
}

/// `parse -> NMS -> scale`. NMS runs in model space, before rescaling.
pub fn postprocess(raw: &[f32], pre: &PreprocessResult, config: &ModelConfig) -> Result<Vec<Detection>, DetectError> {
    let parsed = parse_output(raw, config)?;
    let kept = apply_nms(parsed, config.iou_threshold);
    Ok(scale_detections(kept, pre))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ModelConfig {
        // 32x32 input: 16 + 4 + 1 = 21 predictions.
        ModelConfig::default().with_input_size(32, 32)
    }

    fn write(raw: &mut [f32], n: usize, i: usize, bbox: [f32; 4], probs: &[f32]) {
        for (f, v) in bbox.iter().chain(probs.iter()).enumerate() {
            raw[f * n + i] = *v;
        }
    }

    #[test]
    fn accessor_reads_feature_major_offsets() {
        let (features, n) = (7, 5);
        let raw: Vec<f32> = (0..features * n).map(|v| v as f32).collect();
        let view = OutputView::new(&raw, features, n).unwrap();
        for f in 0..features {
            for i in 0..n {
                assert_eq!(view.get(f, i), (f * n + i) as f32);
            }
        }
    }

    #[test]
    fn parse_picks_best_class_above_threshold() {
        let config = small_config();
        let n = config.num_predictions();
        let mut raw = vec![0.0; config.expected_output_len()];
        write(&mut raw, n, 3, [10., 12., 4., 6.], &[0.1, 0.7, 0.2]);
        write(&mut raw, n, 9, [20., 20., 8., 8.], &[0.3, 0.2, 0.4]);

        let dets = parse_output(&raw, &config).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert_eq!(dets[0].class_name, "bruise");
        assert_eq!(dets[0].confidence, 0.7);
        assert_eq!(dets[0].bbox, BoundingBox::new(10., 12., 4., 6.));
    }

    #[test]
    fn threshold_is_inclusive() {
        let config = small_config();
        let n = config.num_predictions();
        let mut raw = vec![0.0; config.expected_output_len()];
        write(&mut raw, n, 0, [5., 5., 2., 2.], &[0.5, 0.0, 0.0]);
        assert_eq!(parse_output(&raw, &config).unwrap().len(), 1);
    }

    #[test]
    fn wrong_length_is_size_mismatch() {
        let config = small_config();
        let raw = vec![0.0; config.expected_output_len() - 1];
        assert_eq!(
            parse_output(&raw, &config).unwrap_err(),
            DetectError::SizeMismatch { expected: config.expected_output_len(), actual: raw.len() }
        );
    }

    #[test]
    fn scaling_inverts_letterbox_and_clamps() {
        let pre = PreprocessResult {
            tensor: Vec::new(),
            original_width: 1200,
            original_height: 600,
            scale: 640. / 1200.,
            pad_x: 0.,
            pad_y: 160.,
        };
        let inside = Detection::default().with_cxcy_wh(320., 320., 64., 32.);
        let overshoot = Detection::default().with_cxcy_wh(630., 170., 40., 40.);

        let scaled = scale_detections(vec![inside, overshoot], &pre);
        let b = scaled[0].bbox;
        assert!((b.x - 600.).abs() < 1e-3);
        assert!((b.y - 300.).abs() < 1e-3);
        assert!((b.width - 120.).abs() < 1e-3);
        assert!((b.height - 60.).abs() < 1e-3);

        let c = scaled[1].box_corners();
        assert!(c.x1 >= 0. && c.y1 >= 0.);
        assert!(c.x2 <= 1200. && c.y2 <= 600.);
        assert_eq!(c.y1, 0.);
        assert_eq!(c.x2, 1200.);
    }

    #[test]
    fn postprocess_suppresses_duplicates_before_scaling() {
        let config = small_config();
        let n = config.num_predictions();
        let mut raw = vec![0.0; config.expected_output_len()];
        write(&mut raw, n, 1, [16., 16., 10., 10.], &[0.0, 0.0, 0.9]);
        write(&mut raw, n, 2, [16.5, 16., 10., 10.], &[0.0, 0.0, 0.8]);
        let pre = PreprocessResult {
            tensor: Vec::new(),
            original_width: 64,
            original_height: 64,
            scale: 0.5,
            pad_x: 0.,
            pad_y: 0.,
        };

        let dets = postprocess(&raw, &pre, &config).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].confidence, 0.9);
        assert_eq!(dets[0].bbox, BoundingBox::new(32., 32., 20., 20.));
    }
}
