//! Square hand bounding box in render-canvas pixels

use crate::vision::Landmark;

/// Fraction of the side added on each edge
const PADDING_PERCENT: f32 = 0.1;

/// Smallest side a box collapses to when all landmarks coincide
pub const MIN_BOX_SIDE: u32 = 16;

/// Axis-aligned box in canvas pixel space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Padded square around the landmarks, clamped inside the canvas.
    ///
    /// The side is the larger extent of the hand plus 10% on each edge, with a
    /// floor of [`MIN_BOX_SIDE`] and a ceiling of the shorter canvas dimension.
    /// Returns `None` for an empty landmark set or an empty canvas.
    pub fn from_landmarks(points: &[Landmark], canvas_width: u32, canvas_height: u32) -> Option<Self> {
        if canvas_width == 0 || canvas_height == 0 {
            return None;
        }
        let (min_x, min_y, max_x, max_y) = pixel_extent(points, canvas_width, canvas_height)?;

        let center_x = (min_x + max_x) / 2.0;
        let center_y = (min_y + max_y) / 2.0;
        let size = (max_x - min_x).max(max_y - min_y) * (1.0 + PADDING_PERCENT * 2.0);

        let side = (size.floor() as u32)
            .max(MIN_BOX_SIDE)
            .min(canvas_width.min(canvas_height));

        let half = side as f32 / 2.0;
        let x = ((center_x - half).floor().max(0.0) as u32).min(canvas_width - side);
        let y = ((center_y - half).floor().max(0.0) as u32).min(canvas_height - side);

        Some(Self::new(x, y, side, side))
    }

    /// Reflect about the vertical axis of a canvas `canvas_width` wide
    pub fn mirrored(&self, canvas_width: u32) -> Self {
        Self {
            x: canvas_width.saturating_sub(self.x + self.width),
            ..*self
        }
    }

    /// Horizontal center in pixels
    pub fn center_x(&self) -> f32 {
        self.x as f32 + self.width as f32 / 2.0
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// (min_x, min_y, max_x, max_y) of the landmarks in canvas pixels
fn pixel_extent(points: &[Landmark], canvas_width: u32, canvas_height: u32) -> Option<(f32, f32, f32, f32)> {
    if points.is_empty() {
        return None;
    }

    let (w, h) = (canvas_width as f32, canvas_height as f32);
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for p in points {
        min_x = min_x.min(p.x * w);
        min_y = min_y.min(p.y * h);
        max_x = max_x.max(p.x * w);
        max_y = max_y.max(p.y * h);
    }

    Some((min_x, min_y, max_x, max_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(points: &[(f32, f32)]) -> Vec<Landmark> {
        points.iter().map(|&(x, y)| Landmark::new(x, y)).collect()
    }

    /// Tight box around the landmarks, without padding or squaring
    fn enclosing(points: &[Landmark], w: u32, h: u32) -> BoundingBox {
        let (min_x, min_y, max_x, max_y) = pixel_extent(points, w, h).unwrap();
        let (x, y) = (min_x.floor().max(0.0), min_y.floor().max(0.0));
        BoundingBox::new(
            x as u32,
            y as u32,
            (max_x.floor() - x) as u32,
            (max_y.floor() - y) as u32,
        )
    }

    fn assert_valid(bbox: &BoundingBox, w: u32, h: u32) {
        assert_eq!(bbox.width, bbox.height, "box must be square: {:?}", bbox);
        assert!(bbox.width <= w && bbox.height <= h);
        assert!(bbox.right() <= w, "box exceeds canvas width: {:?}", bbox);
        assert!(bbox.bottom() <= h, "box exceeds canvas height: {:?}", bbox);
        assert!(bbox.width > 0);
    }

    #[test]
    fn test_reference_box_on_720p() {
        let points = hand(&[(0.4, 0.4), (0.6, 0.6), (0.5, 0.45)]);

        let tight = enclosing(&points, 1280, 720);
        assert_eq!(tight.x, 512);
        assert_eq!(tight.y, 288);
        assert_eq!(tight.right(), 768);
        assert_eq!(tight.bottom(), 432);

        let bbox = BoundingBox::from_landmarks(&points, 1280, 720).unwrap();
        assert_eq!(bbox.width, 307);
        assert_eq!(bbox.height, 307);
        // Recentered on (640, 360) within rounding
        assert!((bbox.center_x() - 640.0).abs() <= 1.0);
        assert!((bbox.y as f32 + bbox.height as f32 / 2.0 - 360.0).abs() <= 1.0);
        assert_valid(&bbox, 1280, 720);
    }

    #[test]
    fn test_identical_points_give_minimum_square() {
        let points = hand(&[(0.5, 0.5); 21]);

        let bbox = BoundingBox::from_landmarks(&points, 1280, 720).unwrap();
        assert_eq!(bbox.width, MIN_BOX_SIDE);
        assert_valid(&bbox, 1280, 720);
    }

    #[test]
    fn test_box_near_corner_is_clamped() {
        let points = hand(&[(0.0, 0.0), (0.1, 0.2)]);

        let bbox = BoundingBox::from_landmarks(&points, 1280, 720).unwrap();
        assert_eq!((bbox.x, bbox.y), (0, 0));
        assert_valid(&bbox, 1280, 720);

        let points = hand(&[(0.95, 0.9), (1.0, 1.0)]);
        let bbox = BoundingBox::from_landmarks(&points, 1280, 720).unwrap();
        assert_valid(&bbox, 1280, 720);
    }

    #[test]
    fn test_oversized_hand_fits_canvas() {
        let points = hand(&[(-0.2, -0.1), (1.3, 1.2)]);

        let bbox = BoundingBox::from_landmarks(&points, 1280, 720).unwrap();
        assert_eq!(bbox.width, 720);
        assert_valid(&bbox, 1280, 720);
    }

    #[test]
    fn test_many_random_hands_stay_valid() {
        // Deterministic LCG so the sweep is reproducible
        let mut seed: u32 = 12345;
        let mut next = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (seed >> 8) as f32 / (1u32 << 24) as f32
        };

        for _ in 0..500 {
            let points: Vec<Landmark> = (0..21).map(|_| Landmark::new(next(), next())).collect();
            let bbox = BoundingBox::from_landmarks(&points, 640, 480).unwrap();
            assert_valid(&bbox, 640, 480);
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert!(BoundingBox::from_landmarks(&[], 1280, 720).is_none());
        assert!(BoundingBox::from_landmarks(&hand(&[(0.5, 0.5)]), 0, 720).is_none());
    }

    #[test]
    fn test_mirrored() {
        let bbox = BoundingBox::new(100, 50, 200, 200);
        let mirrored = bbox.mirrored(1280);
        assert_eq!(mirrored.x, 980);
        assert_eq!((mirrored.y, mirrored.width, mirrored.height), (50, 200, 200));
        assert_eq!(mirrored.mirrored(1280), bbox);
    }
}
