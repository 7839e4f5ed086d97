//! Reference plane of the sand surface and the elevation colour range.

use glam::{Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Base plane given by a normal and a point on the plane, in raw sensor units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasePlane {
    pub normal: Vec3,
    pub offset: Vec3,
}

impl Default for BasePlane {
    fn default() -> Self {
        Self {
            normal: Vec3::Z,
            offset: Vec3::new(0.0, 0.0, 870.0),
        }
    }
}

impl BasePlane {
    /// Offset step applied by one nudge.
    pub const OFFSET_STEP: f32 = 0.5;
    /// Rotation step in degrees applied by one tilt.
    pub const TILT_STEP_DEGREES: f32 = 1.0;

    pub fn new(normal: Vec3, offset: Vec3) -> Self {
        Self { normal, offset }
    }

    /// Homogeneous plane equation `(n, -n·offset)`.
    pub fn raw_equation(&self) -> Vec4 {
        self.normal.extend(-self.normal.dot(self.offset))
    }

    /// Plane equation for vertices whose z is normalized by `depth_norm`
    /// while x, y and w stay in raw units.
    pub fn equation(&self, depth_norm: f32) -> Vec4 {
        self.raw_equation() / Vec4::new(depth_norm, depth_norm, 1.0, depth_norm)
    }

    /// Signed distance of a raw-unit point along the normal.
    pub fn elevation_of(&self, point: Vec3) -> f32 {
        self.raw_equation().dot(point.extend(1.0))
    }

    /// Move the plane along z by `steps` offset steps.
    pub fn nudge_offset(&mut self, steps: f32) {
        self.offset.z += steps * Self::OFFSET_STEP;
    }

    /// Rotate the normal by `steps` tilt steps about the X axis.
    pub fn tilt_x(&mut self, steps: f32) {
        self.rotate_normal(Vec3::X, steps);
    }

    /// Rotate the normal by `steps` tilt steps about the Y axis.
    pub fn tilt_y(&mut self, steps: f32) {
        self.rotate_normal(Vec3::Y, steps);
    }

    fn rotate_normal(&mut self, axis: Vec3, steps: f32) {
        let angle = (steps * Self::TILT_STEP_DEGREES).to_radians();
        self.normal = Quat::from_axis_angle(axis, angle) * self.normal;
    }
}

/// Elevation span mapped onto the height colour map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationRange {
    pub min: f32,
    pub max: f32,
    /// Number of entries in the colour map
    pub entries: u32,
}

impl Default for ElevationRange {
    fn default() -> Self {
        Self {
            min: -950.0 / 2000.0,
            max: -750.0 / 2000.0,
            entries: 256,
        }
    }
}

impl ElevationRange {
    /// Scale both ends of the range.
    pub fn scale(&mut self, factor: f32) {
        self.min *= factor;
        self.max *= factor;
    }

    /// Grow or shrink the colour map, keeping at least two entries.
    pub fn change_entries(&mut self, delta: i32) {
        self.entries = (self.entries as i64 + delta as i64).max(2) as u32;
    }

    /// `(scale, offset)` mapping an elevation onto a colour map coordinate,
    /// or `None` for an empty range.
    pub fn height_map_transform(&self) -> Option<(f32, f32)> {
        let span = self.max - self.min;
        if span.abs() <= f32::EPSILON || self.entries == 0 {
            return None;
        }
        let n = self.entries as f32;
        let scale = (n - 1.0) / span;
        let offset = 0.5 / n - scale * self.min;
        Some((scale, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_equation() {
        let plane = BasePlane::default();
        let eq = plane.raw_equation();
        assert_eq!(eq, Vec4::new(0.0, 0.0, 1.0, -870.0));

        let normalized = plane.equation(2000.0);
        assert_relative_eq!(normalized.z, 1.0);
        assert_relative_eq!(normalized.w, -870.0 / 2000.0);
    }

    #[test]
    fn test_elevation_of() {
        let plane = BasePlane::default();
        assert_relative_eq!(plane.elevation_of(Vec3::new(5.0, 5.0, 900.0)), 30.0);
        assert_relative_eq!(plane.elevation_of(Vec3::new(0.0, 0.0, 870.0)), 0.0);
    }

    #[test]
    fn test_nudge_and_tilt() {
        let mut plane = BasePlane::default();
        plane.nudge_offset(1.0);
        plane.nudge_offset(1.0);
        plane.nudge_offset(-1.0);
        assert_relative_eq!(plane.offset.z, 870.5);

        plane.tilt_x(90.0);
        assert!(plane.normal.abs_diff_eq(Vec3::new(0.0, -1.0, 0.0), 1e-5));
        plane.tilt_x(-90.0);
        plane.tilt_y(1.0);
        assert_relative_eq!(plane.normal.length(), 1.0, epsilon = 1e-6);
        assert!(plane.normal.x > 0.0);
    }

    #[test]
    fn test_height_map_transform() {
        let range = ElevationRange {
            min: 0.0,
            max: 1.0,
            entries: 11,
        };
        let (scale, offset) = range.height_map_transform().unwrap();
        assert_relative_eq!(scale, 10.0);
        assert_relative_eq!(offset, 0.5 / 11.0);

        let flat = ElevationRange {
            min: 0.3,
            max: 0.3,
            entries: 11,
        };
        assert!(flat.height_map_transform().is_none());
    }

    #[test]
    fn test_scale_and_entries() {
        let mut range = ElevationRange::default();
        range.scale(2.0);
        assert_relative_eq!(range.min, -0.95);
        range.change_entries(-1000);
        assert_eq!(range.entries, 2);
    }
}
