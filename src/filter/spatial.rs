//! 3x3 binomial smoothing restricted to the ROI.

use crate::geometry::Roi;

const KERNEL: [[f32; 3]; 3] = [[1.0, 2.0, 1.0], [2.0, 4.0, 2.0], [1.0, 2.0, 1.0]];
const KERNEL_SUM: f32 = 16.0;

/// Smooth `input` into `output`.
///
/// Only pixels whose whole 3x3 neighbourhood lies inside `roi` and holds valid
/// (positive) values are smoothed; every other ROI pixel passes through.
/// Pixels outside the ROI are written as `0.0`.
pub(crate) fn apply(width: u32, roi: &Roi, input: &[f32], output: &mut [f32]) {
    let width = width as usize;
    output.fill(0.0);

    for y in roi.min_y..roi.max_y {
        for x in roi.min_x..roi.max_x {
            let index = y as usize * width + x as usize;
            let interior =
                x > roi.min_x && x + 1 < roi.max_x && y > roi.min_y && y + 1 < roi.max_y;
            output[index] = if interior {
                smooth_at(width, x as usize, y as usize, input).unwrap_or(input[index])
            } else {
                input[index]
            };
        }
    }
}

fn smooth_at(width: usize, x: usize, y: usize, input: &[f32]) -> Option<f32> {
    let mut acc = 0.0;
    for (ky, kernel_row) in KERNEL.iter().enumerate() {
        let row = (y + ky - 1) * width;
        for (kx, weight) in kernel_row.iter().enumerate() {
            let value = input[row + x + kx - 1];
            if value <= 0.0 {
                return None;
            }
            acc += weight * value;
        }
    }
    Some(acc / KERNEL_SUM)
}
