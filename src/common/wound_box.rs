use serde::{Deserialize, Serialize};

/// Box in center form: `(x, y)` is the center, in the pixel space of whatever image
/// the box currently refers to (model input or original photo).
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Corner form of a [`BoundingBox`]. Always derived, never stored on its own.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxCorners {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Builds a center-form box from `(x1, y1, x2, y2)`.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: (x1 + x2) / 2.,
            y: (y1 + y2) / 2.,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Returns the corner view of this box.
    pub fn corners(&self) -> BoundingBoxCorners {
        center_to_corners(self)
    }

    /// Computes the area of the bounding box.
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Computes the intersection area between this bounding box and another.
    pub fn intersect(&self, other: &BoundingBox) -> f32 {
        let a = self.corners();
        let b = other.corners();
        let left = a.x1.max(b.x1);
        let right = a.x2.min(b.x2);
        let top = a.y1.max(b.y1);
        let bottom = a.y2.min(b.y2);
        (right - left).max(0.) * (bottom - top).max(0.)
    }

    /// Computes the union area between this bounding box and another.
    ///
    /// Areas come from the corner view, the same one [`BoundingBox::intersect`] uses,
    /// so a box united with itself has exactly its intersection area.
    pub fn union(&self, other: &BoundingBox) -> f32 {
        self.corners().area() + other.corners().area() - self.intersect(other)
    }

    /// Intersection over union. Zero when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        calculate_iou(self, other)
    }

    /// Clips the box to `[0, max_w] x [0, max_h]`, keeping it in center form.
    pub fn clamp_to(&self, max_w: f32, max_h: f32) -> Self {
        let c = self.corners();
        let x1 = c.x1.clamp(0., max_w);
        let y1 = c.y1.clamp(0., max_h);
        let x2 = c.x2.clamp(x1, max_w);
        let y2 = c.y2.clamp(y1, max_h);
        Self::from_corners(x1, y1, x2, y2)
    }

    /// Checks if this bounding box completely contains another bounding box `other`.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        let a = self.corners();
        let b = other.corners();
        a.x1 <= b.x1 && a.x2 >= b.x2 && a.y1 <= b.y1 && a.y2 >= b.y2
    }
}

impl BoundingBoxCorners {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.) * self.height().max(0.)
    }

    pub fn as_x1y1_x2y2_i32(&self) -> (i32, i32, i32, i32) {
        (self.x1.round() as i32,
         self.y1.round() as i32,
         self.x2.round() as i32,
         self.y2.round() as i32)
    }
}

impl From<BoundingBoxCorners> for BoundingBox {
    fn from(c: BoundingBoxCorners) -> Self {
        BoundingBox::from_corners(c.x1, c.y1, c.x2, c.y2)
    }
}

/// Converts a center-form box to its corners.
pub fn center_to_corners(b: &BoundingBox) -> BoundingBoxCorners {
    let half_w = b.width / 2.;
    let half_h = b.height / 2.;
    BoundingBoxCorners {
        x1: b.x - half_w,
        y1: b.y - half_h,
        x2: b.x + half_w,
        y2: b.y + half_h,
    }
}

/// Intersection area over union area of two boxes, computed on their corners.
pub fn calculate_iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let union = a.union(b);
    if union <= 0. {
        return 0.;
    }
    a.intersect(b) / union
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_keep_box_extent() {
        let b = BoundingBox::new(100., 80., 50., 30.);
        let c = center_to_corners(&b);
        assert_eq!(c.x2 - c.x1, b.width);
        assert_eq!(c.y2 - c.y1, b.height);
        assert_eq!(BoundingBox::from(c), b);
    }

    #[test]
    fn iou_of_identical_box_is_one() {
        let b = BoundingBox::new(100., 100., 50., 50.);
        assert!((calculate_iou(&b, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_identical_off_grid_box_is_exactly_one() {
        let b = BoundingBox::new(600.3, 611.7, 1.3, 1.7);
        assert_eq!(calculate_iou(&b, &b), 1.0);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(50., 50., 20., 20.);
        let b = BoundingBox::new(200., 200., 20., 20.);
        assert_eq!(calculate_iou(&a, &b), 0.);
    }

    #[test]
    fn iou_of_half_overlap() {
        // Overlap is 50x100 over a union of 15000.
        let a = BoundingBox::from_corners(0., 0., 100., 100.);
        let b = BoundingBox::from_corners(50., 0., 150., 100.);
        assert!((calculate_iou(&a, &b) - 5000. / 15000.).abs() < 1e-6);
    }

    #[test]
    fn degenerate_boxes_have_zero_iou() {
        let a = BoundingBox::new(10., 10., 0., 0.);
        assert_eq!(calculate_iou(&a, &a), 0.);
    }

    #[test]
    fn clamp_keeps_box_inside_image() {
        let b = BoundingBox::from_corners(-10., 20., 130., 90.).clamp_to(100., 80.);
        let c = b.corners();
        assert_eq!((c.x1, c.y1, c.x2, c.y2), (0., 20., 100., 80.));
        assert!(BoundingBox::from_corners(0., 0., 100., 80.).contains(&b));
    }
}
