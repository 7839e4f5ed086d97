//! Region of interest in sensor pixel coordinates.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned pixel rectangle. `min` is inclusive, `max` exclusive.
///
/// A freshly built ROI may have its corners in any order; `standardized`
/// puts `min <= max` on both axes and `clamped` keeps it inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Roi {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Roi {
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The whole frame.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Rectangle spanned by two corner points, rounded outwards.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let lo = a.min(b);
        let hi = a.max(b);
        Self::new(
            lo.x.floor() as i32,
            lo.y.floor() as i32,
            hi.x.ceil() as i32,
            hi.y.ceil() as i32,
        )
    }

    /// Same rectangle with `min <= max` on both axes.
    pub fn standardized(&self) -> Self {
        Self::new(
            self.min_x.min(self.max_x),
            self.min_y.min(self.max_y),
            self.min_x.max(self.max_x),
            self.min_y.max(self.max_y),
        )
    }

    pub fn is_standard(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    /// Intersection with a `width x height` frame. Expects a standardized ROI.
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as i32, height as i32);
        let min_x = self.min_x.clamp(0, w);
        let min_y = self.min_y.clamp(0, h);
        Self::new(
            min_x,
            min_y,
            self.max_x.clamp(min_x, w),
            self.max_y.clamp(min_y, h),
        )
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> i64 {
        self.width().max(0) as i64 * self.height().max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min_x + self.max_x) as f32 * 0.5,
            (self.min_y + self.max_y) as f32 * 0.5,
        )
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]-[{}, {}] ({}x{})",
            self.min_x,
            self.min_y,
            self.max_x,
            self.max_y,
            self.width(),
            self.height()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardize_orders_corners() {
        let coords = [-7, 0, 3, 640];
        for &ax in &coords {
            for &ay in &coords {
                for &bx in &coords {
                    for &by in &coords {
                        let roi = Roi::new(ax, ay, bx, by).standardized();
                        assert!(roi.min_x <= roi.max_x);
                        assert!(roi.min_y <= roi.max_y);
                        assert!(roi.is_standard());
                    }
                }
            }
        }
    }

    #[test]
    fn test_clamped_stays_in_frame() {
        let roi = Roi::new(-10, 5, 700, 900).clamped(640, 480);
        assert_eq!(roi, Roi::new(0, 5, 640, 480));

        let outside = Roi::new(700, 500, 800, 600).clamped(640, 480);
        assert!(outside.is_empty());
        assert!(outside.is_standard());
    }

    #[test]
    fn test_from_corners_rounds_outwards() {
        let roi = Roi::from_corners(Vec2::new(10.7, 20.2), Vec2::new(2.5, 4.9));
        assert_eq!(roi, Roi::new(2, 4, 11, 21));
    }

    #[test]
    fn test_contains_and_center() {
        let roi = Roi::new(0, 0, 4, 2);
        assert!(roi.contains(0, 0));
        assert!(roi.contains(3, 1));
        assert!(!roi.contains(4, 1));
        assert_eq!(roi.center(), Vec2::new(2.0, 1.0));
        assert_eq!(roi.area(), 8);
    }

    #[test]
    fn test_display() {
        assert_eq!(Roi::new(1, 2, 4, 6).to_string(), "[1, 2]-[4, 6] (3x4)");
    }
}
