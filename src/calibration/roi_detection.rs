//! ROI auto-detection by threshold sweep.
//!
//! The filtered frame is binarized at every threshold from 220 to 254. At each
//! level the smallest contour enclosing every chessboard corner is the
//! candidate; the largest candidate over the whole sweep becomes the ROI.

use glam::Vec2;
use image::GrayImage;

use super::CalibrationError;
use crate::filter::FilteredFrame;
use crate::geometry::{Contour, Roi};

/// First threshold of the sweep.
pub const SWEEP_START: u8 = 220;

/// Contour extraction settings handed to the finder.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourParams {
    /// Contours with fewer points are dropped
    pub min_points: usize,
    /// Contours enclosing more area are dropped
    pub max_area: f32,
    /// Polygon simplification tolerance in pixels
    pub simplify_tolerance: f32,
    /// Only report inner boundaries
    pub holes_only: bool,
}

impl ContourParams {
    pub fn for_frame(width: u32, height: u32) -> Self {
        Self {
            min_points: 12,
            max_area: width as f32 * height as f32,
            simplify_tolerance: 5.0,
            holes_only: true,
        }
    }
}

/// Extracts closed contours from a binary image.
pub trait ContourFinder {
    fn find_contours(&mut self, binary: &GrayImage, params: &ContourParams) -> Vec<Contour>;
}

/// Best contour found by a sweep.
#[derive(Debug, Clone)]
pub struct SweepResult {
    pub contour: Contour,
    pub area: f32,
    /// Threshold the contour was found at
    pub threshold: u8,
    /// Standardized bounding box clamped to the frame
    pub roi: Roi,
}

/// Keep pixels at or above `threshold`, zero the rest.
pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        if pixel.0[0] < threshold {
            pixel.0[0] = 0;
        }
    }
    out
}

/// Run the threshold sweep over `frame` for the detected `corners`.
pub fn sweep_roi(
    frame: &FilteredFrame,
    corners: &[Vec2],
    finder: &mut dyn ContourFinder,
) -> Result<SweepResult, CalibrationError> {
    if corners.is_empty() {
        return Err(CalibrationError::RoiDetectionNoInput);
    }

    let gray = frame.to_gray8();
    let params = ContourParams::for_frame(frame.width, frame.height);
    let mut largest: Option<(Contour, f32, u8)> = None;

    for threshold in SWEEP_START..=u8::MAX - 1 {
        let binary = binarize(&gray, threshold);
        let candidate = finder
            .find_contours(&binary, &params)
            .into_iter()
            .filter(|c| c.is_hole())
            .filter(|c| corners.iter().all(|p| c.contains_point(*p)))
            .map(|c| {
                let area = c.area();
                (c, area)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((contour, area)) = candidate {
            log::debug!("ROI sweep: threshold {} encloses the chessboard, area {:.0}", threshold, area);
            if largest.as_ref().map_or(true, |(_, best, _)| area > *best) {
                largest = Some((contour, area, threshold));
            }
        }
    }

    let (contour, area, threshold) = largest.ok_or(CalibrationError::RoiNotFound)?;
    let roi = contour
        .bounding_box()
        .ok_or(CalibrationError::RoiNotFound)?
        .standardized()
        .clamped(frame.width, frame.height);

    log::info!("ROI detected at threshold {}: {}", threshold, roi);
    Ok(SweepResult {
        contour,
        area,
        threshold,
        roi,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reports the bounding rectangle of the non-zero pixels as one hole contour.
    struct BoundingFinder;

    impl ContourFinder for BoundingFinder {
        fn find_contours(&mut self, binary: &GrayImage, _params: &ContourParams) -> Vec<Contour> {
            let mut lo = Vec2::splat(f32::MAX);
            let mut hi = Vec2::splat(f32::MIN);
            for (x, y, p) in binary.enumerate_pixels() {
                if p.0[0] > 0 {
                    let v = Vec2::new(x as f32, y as f32);
                    lo = lo.min(v);
                    hi = hi.max(v);
                }
            }
            if lo.x > hi.x {
                return Vec::new();
            }
            vec![Contour::rectangle(lo, hi, true)]
        }
    }

    /// Returns scripted contours per call, in sweep order.
    struct ScriptedFinder {
        calls: usize,
        script: Vec<Vec<Contour>>,
    }

    impl ContourFinder for ScriptedFinder {
        fn find_contours(&mut self, _binary: &GrayImage, _params: &ContourParams) -> Vec<Contour> {
            let out = self.script.get(self.calls).cloned().unwrap_or_default();
            self.calls += 1;
            out
        }
    }

    fn gray_value(g: u8) -> f32 {
        (g as f32 + 0.5) / 255.0
    }

    /// 100x100 frame: gray 230 over [10, 90), gray 240 over [30, 70).
    fn nested_frame() -> FilteredFrame {
        let mut frame = FilteredFrame::new(100, 100);
        for y in 0..100u32 {
            for x in 0..100u32 {
                let i = (y * 100 + x) as usize;
                if (30..70).contains(&x) && (30..70).contains(&y) {
                    frame.data[i] = gray_value(240);
                } else if (10..90).contains(&x) && (10..90).contains(&y) {
                    frame.data[i] = gray_value(230);
                }
            }
        }
        frame
    }

    #[test]
    fn test_binarize() {
        let gray = GrayImage::from_raw(3, 1, vec![10, 220, 250]).unwrap();
        let binary = binarize(&gray, 220);
        assert_eq!(binary.into_raw(), vec![0, 220, 250]);
    }

    #[test]
    fn test_sweep_keeps_contour_enclosing_all_corners() {
        let frame = nested_frame();
        // (15, 15) falls outside the inner region found from threshold 231 up
        let corners = [Vec2::new(15.0, 15.0), Vec2::new(50.0, 50.0)];
        let result = sweep_roi(&frame, &corners, &mut BoundingFinder).unwrap();

        assert_eq!(result.roi, Roi::new(10, 10, 89, 89));
        assert!(result.threshold <= 230);
        assert!((result.area - 79.0 * 79.0).abs() < 1e-3);
    }

    #[test]
    fn test_sweep_without_corners() {
        let frame = nested_frame();
        let err = sweep_roi(&frame, &[], &mut BoundingFinder).unwrap_err();
        assert!(matches!(err, CalibrationError::RoiDetectionNoInput));
    }

    #[test]
    fn test_sweep_without_enclosing_contour() {
        let frame = nested_frame();
        let corners = [Vec2::new(5.0, 5.0)];
        let err = sweep_roi(&frame, &corners, &mut BoundingFinder).unwrap_err();
        assert!(matches!(err, CalibrationError::RoiNotFound));
    }

    #[test]
    fn test_sweep_ignores_outer_contours() {
        let corners = [Vec2::new(50.0, 50.0)];
        let outer = Contour::rectangle(Vec2::splat(10.0), Vec2::splat(90.0), false);
        let frame = FilteredFrame::new(100, 100);

        let mut finder = ScriptedFinder {
            calls: 0,
            script: vec![vec![outer.clone()]],
        };
        let err = sweep_roi(&frame, &corners, &mut finder).unwrap_err();
        assert!(matches!(err, CalibrationError::RoiNotFound));

        let hole = Contour::rectangle(Vec2::splat(30.0), Vec2::splat(70.0), true);
        let mut finder = ScriptedFinder {
            calls: 0,
            script: vec![vec![outer, hole]],
        };
        let result = sweep_roi(&frame, &corners, &mut finder).unwrap();
        assert_eq!(result.roi, Roi::new(30, 30, 70, 70));
    }

    #[test]
    fn test_sweep_returns_largest_candidate() {
        let corners = [Vec2::new(50.0, 50.0), Vec2::new(55.0, 52.0)];
        let rect = |a: f32, b: f32| Contour::rectangle(Vec2::splat(a), Vec2::splat(b), true);

        let script = vec![
            vec![rect(40.0, 60.0), rect(20.0, 80.0)],
            vec![rect(0.0, 30.0)],
            vec![rect(30.0, 70.0), rect(10.0, 90.0)],
            vec![rect(45.0, 65.0)],
            vec![],
            vec![rect(35.0, 75.0)],
        ];
        // Smallest enclosing contour per call
        let candidates = [400.0f32, 1600.0, 400.0, 1600.0];

        let frame = FilteredFrame::new(100, 100);
        let mut finder = ScriptedFinder { calls: 0, script };
        let result = sweep_roi(&frame, &corners, &mut finder).unwrap();

        assert_eq!(finder.calls, (u8::MAX - SWEEP_START) as usize);
        for area in candidates {
            assert!(result.area >= area);
        }
        assert!((result.area - 1600.0).abs() < 1e-3);
        assert_eq!(result.threshold, SWEEP_START + 2);
        assert_eq!(result.roi, Roi::new(30, 30, 70, 70));
    }
}
