//! Closed polygon returned by a contour extractor.

use glam::Vec2;

use super::Roi;

/// Closed polygon in pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Vec2>,
    /// True for the inner boundary of a region
    pub hole: bool,
}

impl Contour {
    pub fn new(points: Vec<Vec2>, hole: bool) -> Self {
        Self { points, hole }
    }

    /// Axis-aligned rectangle as a four-point contour.
    pub fn rectangle(min: Vec2, max: Vec2, hole: bool) -> Self {
        Self::new(
            vec![
                min,
                Vec2::new(max.x, min.y),
                max,
                Vec2::new(min.x, max.y),
            ],
            hole,
        )
    }

    pub fn is_hole(&self) -> bool {
        self.hole
    }

    /// Even-odd point-in-polygon test.
    pub fn contains_point(&self, p: Vec2) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[j];
            if (a.y > p.y) != (b.y > p.y) {
                let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
                if p.x < x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Enclosed area (shoelace formula), always non-negative.
    pub fn area(&self) -> f32 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice = 0.0f32;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            twice += a.perp_dot(b);
        }
        twice.abs() * 0.5
    }

    pub fn bounding_box(&self) -> Option<Roi> {
        let first = *self.points.first()?;
        let (lo, hi) = self
            .points
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Some(Roi::from_corners(lo, hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rectangle_area_and_contains() {
        let c = Contour::rectangle(Vec2::new(10.0, 10.0), Vec2::new(30.0, 20.0), true);
        assert_relative_eq!(c.area(), 200.0);
        assert!(c.contains_point(Vec2::new(15.0, 15.0)));
        assert!(!c.contains_point(Vec2::new(35.0, 15.0)));
        assert!(!c.contains_point(Vec2::new(15.0, 25.0)));
        assert!(c.is_hole());
    }

    #[test]
    fn test_triangle_area_orientation_independent() {
        let pts = vec![Vec2::ZERO, Vec2::new(4.0, 0.0), Vec2::new(0.0, 3.0)];
        let mut reversed = pts.clone();
        reversed.reverse();
        assert_relative_eq!(Contour::new(pts, false).area(), 6.0);
        assert_relative_eq!(Contour::new(reversed, false).area(), 6.0);
    }

    #[test]
    fn test_concave_contains() {
        // U shape opening upwards
        let c = Contour::new(
            vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(3.0, 0.0),
                Vec2::new(3.0, 3.0),
                Vec2::new(2.0, 3.0),
                Vec2::new(2.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 3.0),
                Vec2::new(0.0, 3.0),
            ],
            false,
        );
        assert!(c.contains_point(Vec2::new(0.5, 2.0)));
        assert!(!c.contains_point(Vec2::new(1.5, 2.0)));
        assert!(c.contains_point(Vec2::new(1.5, 0.5)));
    }

    #[test]
    fn test_bounding_box() {
        let c = Contour::new(
            vec![Vec2::new(5.5, 2.0), Vec2::new(1.0, 7.2), Vec2::new(9.0, 3.0)],
            false,
        );
        assert_eq!(c.bounding_box(), Some(Roi::new(1, 2, 9, 8)));
        assert!(Contour::new(Vec::new(), false).bounding_box().is_none());
    }
}
