use serde::{Deserialize, Serialize};
use crate::common::{BoundingBox, BoundingBoxCorners};
use crate::detection_runners::ort_detector::nms::Nms;

/// One labeled, confidence-scored box.
///
/// `confidence` lies in `[0, 1]` and `class_id` indexes the class names of the
/// [`ModelConfig`](crate::common::ModelConfig) that produced it.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "DetectionRecord", from = "DetectionRecord")]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: usize,
    pub class_name: String,
    pub confidence: f32,
}

/// Serialized shape of a [`Detection`]; carries the corner view alongside the box.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectionRecord {
    #[serde(rename = "box")]
    bbox: BoundingBox,
    #[serde(default, skip_deserializing)]
    box_corners: BoundingBoxCorners,
    class_id: usize,
    class_name: String,
    confidence: f32,
}

impl From<Detection> for DetectionRecord {
    fn from(d: Detection) -> Self {
        Self {
            box_corners: d.box_corners(),
            bbox: d.bbox,
            class_id: d.class_id,
            class_name: d.class_name,
            confidence: d.confidence,
        }
    }
}

impl From<DetectionRecord> for Detection {
    fn from(r: DetectionRecord) -> Self {
        Self {
            bbox: r.bbox,
            class_id: r.class_id,
            class_name: r.class_name,
            confidence: r.confidence,
        }
    }
}

impl Nms for Detection {
    /// Computes the intersection over union (IoU) between this detection and another.
    fn iou(&self, other: &Self) -> f32 {
        self.bbox.iou(&other.bbox)
    }

    /// Returns the confidence score of the detection.
    fn confidence(&self) -> f32 {
        self.confidence
    }
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: usize, class_name: &str, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            class_name: class_name.to_string(),
            confidence,
        }
    }

    /// Sets the box using `(cx, cy, w, h)`.
    pub fn with_cxcy_wh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.bbox = BoundingBox::new(cx, cy, w, h);
        self
    }

    /// Sets the box using `(x1, y1, x2, y2)`.
    pub fn with_x1y1_x2y2(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = BoundingBox::from_corners(x1, y1, x2, y2);
        self
    }

    pub fn with_confidence(mut self, conf: f32) -> Self {
        self.confidence = conf;
        self
    }

    pub fn with_class(mut self, class_id: usize, class_name: &str) -> Self {
        self.class_id = class_id;
        self.class_name = class_name.to_string();
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = bbox;
        self
    }

    /// Corner view of [`Detection::bbox`].
    pub fn box_corners(&self) -> BoundingBoxCorners {
        self.bbox.corners()
    }

    /// `className (NN%)`, as printed in log lines.
    pub fn label(&self) -> String {
        format!("{} ({:.0}%)", self.class_name, self.confidence * 100.)
    }
}
