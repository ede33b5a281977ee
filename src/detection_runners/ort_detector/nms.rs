use std::cmp::Ordering;

pub trait Nms {
    fn iou(&self, other: &Self) -> f32;
    fn confidence(&self) -> f32;
}

/// Greedy non-maximum suppression.
///
/// Sorts by confidence, highest first (stable, so ties keep scan order), then keeps
/// each box that no already kept box overlaps by more than `iou_threshold`.
pub fn apply_nms<T: Nms>(mut boxes: Vec<T>, iou_threshold: f32) -> Vec<T> {
    if boxes.len() < 2 {
        return boxes;
    }

    boxes.sort_by(|b1, b2| {
        b2.confidence()
            .partial_cmp(&b1.confidence())
            .unwrap_or(Ordering::Equal)
    });

    let mut suppressed = vec![false; boxes.len()];
    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..boxes.len() {
            if !suppressed[j] && boxes[i].iou(&boxes[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    let before = boxes.len();
    let kept: Vec<T> = boxes
        .into_iter()
        .zip(suppressed)
        .filter_map(|(b, s)| (!s).then_some(b))
        .collect();
    log::trace!("NMS kept {} of {} boxes (iou > {} suppressed)", kept.len(), before, iou_threshold);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{BoundingBox, Detection};

    fn det(x1: f32, y1: f32, x2: f32, y2: f32, conf: f32) -> Detection {
        Detection::default()
            .with_x1y1_x2y2(x1, y1, x2, y2)
            .with_class(0, "abrasion")
            .with_confidence(conf)
    }

    #[test]
    fn empty_and_single_pass_through() {
        assert!(apply_nms(Vec::<Detection>::new(), 0.45).is_empty());
        let d = det(0., 0., 10., 10., 0.7);
        assert_eq!(apply_nms(vec![d.clone()], 0.45), vec![d]);
    }

    #[test]
    fn overlapping_lower_confidence_is_suppressed() {
        let kept = apply_nms(
            vec![
                det(0., 0., 100., 100., 0.6),
                det(5., 5., 105., 105., 0.9),
                det(300., 300., 350., 350., 0.5),
            ],
            0.45,
        );
        let confs: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
        assert_eq!(confs, vec![0.9, 0.5]);
    }

    #[test]
    fn suppressed_boxes_do_not_suppress_others() {
        // B overlaps A and C, A and C do not overlap: A suppresses B, C survives.
        let a = det(0., 0., 100., 100., 0.9);
        let b = det(50., 0., 150., 100., 0.8);
        let c = det(110., 0., 210., 100., 0.7);
        let kept = apply_nms(vec![c.clone(), b, a.clone()], 0.3);
        assert_eq!(kept, vec![a, c]);
    }

    #[test]
    fn ties_keep_scan_order() {
        let first = det(0., 0., 100., 100., 0.8).with_class(1, "bruise");
        let second = det(2., 2., 102., 102., 0.8).with_class(2, "cut");
        let kept = apply_nms(vec![first.clone(), second], 0.45);
        assert_eq!(kept, vec![first]);
    }

    #[test]
    fn threshold_is_exclusive() {
        let a = Detection::default().with_bbox(BoundingBox::from_corners(0., 0., 100., 100.)).with_confidence(0.9);
        let b = Detection::default().with_bbox(BoundingBox::from_corners(50., 0., 150., 100.)).with_confidence(0.8);
        let iou = a.iou(&b);
        assert_eq!(apply_nms(vec![a.clone(), b.clone()], iou).len(), 2);
        assert_eq!(apply_nms(vec![a, b], iou - 1e-4).len(), 1);
    }
}
