//! Chessboard pattern shown by the projector and the corner detector seam.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::sensor::ColorFrame;

/// Chessboard drawn on the projector during point collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChessboardConfig {
    /// Squares along X
    pub cols: u32,
    /// Squares along Y
    pub rows: u32,
    /// Board edge length in projector pixels
    pub size: u32,
    /// Top-left corner in projector pixels
    pub x: i32,
    pub y: i32,
}

impl Default for ChessboardConfig {
    fn default() -> Self {
        Self {
            cols: 5,
            rows: 4,
            size: 300,
            x: 0,
            y: 0,
        }
    }
}

impl ChessboardConfig {
    /// Size change applied by one resize step.
    pub const SIZE_STEP: u32 = 20;

    /// Inner corners as `(cols - 1, rows - 1)`.
    pub fn pattern_size(&self) -> (u32, u32) {
        (self.cols.saturating_sub(1), self.rows.saturating_sub(1))
    }

    /// Number of inner corners the detector must report.
    pub fn corner_count(&self) -> usize {
        let (c, r) = self.pattern_size();
        (c * r) as usize
    }

    /// Projector coordinates of the inner corners, row by row.
    pub fn projector_points(&self) -> Vec<Vec2> {
        let mut points = Vec::with_capacity(self.corner_count());
        if self.cols == 0 || self.rows == 0 {
            return points;
        }
        for j in 1..self.rows {
            for i in 1..self.cols {
                let x0 = (i * self.size / self.cols) as i32;
                let y0 = (j * self.size / self.rows) as i32;
                points.push(Vec2::new((self.x + x0) as f32, (self.y + y0) as f32));
            }
        }
        points
    }

    /// Grow or shrink the board by `steps` resize steps, never below one step.
    pub fn resize(&mut self, steps: i32) {
        let size = self.size as i64 + steps as i64 * Self::SIZE_STEP as i64;
        self.size = size.max(Self::SIZE_STEP as i64) as u32;
    }

    pub fn move_to(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }
}

/// Finds the inner chessboard corners in a colour frame.
///
/// Returns the corners in the same row-major order as
/// [`ChessboardConfig::projector_points`], or `None` when the board is not found.
pub trait ChessboardDetector {
    fn find_corners(&mut self, color: &ColorFrame, pattern_size: (u32, u32)) -> Option<Vec<Vec2>>;
}

/// Detector returning a fixed set of corners. Used for replaying recorded
/// sessions and in tests.
#[derive(Debug, Clone, Default)]
pub struct FixedCorners {
    pub corners: Option<Vec<Vec2>>,
}

impl FixedCorners {
    pub fn new(corners: Vec<Vec2>) -> Self {
        Self {
            corners: Some(corners),
        }
    }
}

impl ChessboardDetector for FixedCorners {
    fn find_corners(&mut self, _color: &ColorFrame, pattern_size: (u32, u32)) -> Option<Vec<Vec2>> {
        let corners = self.corners.as_ref()?;
        let expected = (pattern_size.0 * pattern_size.1) as usize;
        (corners.len() == expected).then(|| corners.clone())
    }
}
