//! Coarse gradient grid over the ROI.

use glam::Vec2;

use crate::geometry::Roi;

/// Per-cell gradient of the mean filtered elevation.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientField {
    /// Cell size in pixels
    pub resolution: u32,
    /// Cells along X
    pub cols: usize,
    /// Cells along Y
    pub rows: usize,
    /// Top-left pixel of the grid (the ROI origin)
    pub origin: (i32, i32),
    /// Row-major gradient vectors
    pub cells: Vec<Vec2>,
    /// Row-major mean elevation per cell, 0 for cells without valid samples
    pub means: Vec<f32>,
}

impl GradientField {
    /// Empty field for an ROI of zero area.
    pub fn empty(resolution: u32) -> Self {
        Self {
            resolution,
            cols: 0,
            rows: 0,
            origin: (0, 0),
            cells: Vec::new(),
            means: Vec::new(),
        }
    }

    /// Build the field from a filtered frame of `width` pixels per row.
    pub fn compute(
        width: u32,
        roi: &Roi,
        filtered: &[f32],
        resolution: u32,
        max_gradient: f32,
    ) -> Self {
        let resolution = resolution.max(1);
        if roi.is_empty() {
            return Self::empty(resolution);
        }
        let res = resolution as i32;
        let cols = ((roi.width() + res - 1) / res) as usize;
        let rows = ((roi.height() + res - 1) / res) as usize;

        let mut sums = vec![0.0f32; cols * rows];
        let mut counts = vec![0u32; cols * rows];
        for y in roi.min_y..roi.max_y {
            let cy = ((y - roi.min_y) / res) as usize;
            for x in roi.min_x..roi.max_x {
                let value = filtered[y as usize * width as usize + x as usize];
                if value > 0.0 {
                    let cell = cy * cols + ((x - roi.min_x) / res) as usize;
                    sums[cell] += value;
                    counts[cell] += 1;
                }
            }
        }

        let means: Vec<f32> = sums
            .iter()
            .zip(&counts)
            .map(|(&s, &n)| if n > 0 { s / n as f32 } else { 0.0 })
            .collect();

        let mut cells = vec![Vec2::ZERO; cols * rows];
        for cy in 0..rows {
            for cx in 0..cols {
                let index = cy * cols + cx;
                if counts[index] == 0 {
                    continue;
                }
                let gx = difference(&means, &counts, index, cx, cols, 1);
                let gy = difference(&means, &counts, index, cy, rows, cols);
                cells[index] = Vec2::new(gx, gy).clamp_length_max(max_gradient);
            }
        }

        Self {
            resolution,
            cols,
            rows,
            origin: (roi.min_x, roi.min_y),
            cells,
            means,
        }
    }

    /// Gradient of the cell at grid coordinates.
    pub fn get(&self, col: usize, row: usize) -> Option<Vec2> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells.get(row * self.cols + col).copied()
    }

    /// Gradient of the cell containing frame pixel `(x, y)`.
    pub fn at_pixel(&self, x: i32, y: i32) -> Option<Vec2> {
        let res = self.resolution as i32;
        let col = x - self.origin.0;
        let row = y - self.origin.1;
        if col < 0 || row < 0 {
            return None;
        }
        self.get((col / res) as usize, (row / res) as usize)
    }
}

/// Forward difference against the next cell along one axis, backward on the
/// last cell. Neighbours without samples contribute no gradient.
fn difference(
    means: &[f32],
    counts: &[u32],
    index: usize,
    position: usize,
    len: usize,
    stride: usize,
) -> f32 {
    if len < 2 {
        return 0.0;
    }
    let (from, to) = if position + 1 < len {
        (index, index + stride)
    } else {
        (index - stride, index)
    };
    if counts[from] == 0 || counts[to] == 0 {
        return 0.0;
    }
    means[to] - means[from]
}
