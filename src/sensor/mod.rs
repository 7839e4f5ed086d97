//! Depth sensor interface.
//!
//! The sensor SDK is an external collaborator. The acquisition worker only
//! needs blocking depth frames, the matching colour frame and the depth
//! camera intrinsics used to lift pixels into camera space.

mod synthetic;

pub use synthetic::{ScriptEnd, SyntheticSensor};

use bytes::Bytes;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw depth value in sensor units. Zero means "no return".
pub type RawDepth = u16;

/// Errors raised by a depth sensor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("Sensor not available: {0}")]
    Unavailable(String),
    #[error("Failed to read frame: {0}")]
    ReadFailed(String),
    #[error("Frame size mismatch: expected {expected} samples, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Sensor stream ended")]
    Disconnected,
}

/// One raw depth frame as delivered by the sensor.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Row-major depth samples.
    pub data: Vec<RawDepth>,
    /// Sensor frame counter.
    pub frame_number: u64,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, data: Vec<RawDepth>) -> Result<Self, SensorError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(SensorError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            frame_number: 0,
        })
    }

    /// Frame filled with a single depth value.
    pub fn filled(width: u32, height: u32, value: RawDepth) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
            frame_number: 0,
        }
    }

    pub fn with_frame_number(mut self, frame_number: u64) -> Self {
        self.frame_number = frame_number;
        self
    }

    pub fn get(&self, x: u32, y: u32) -> Option<RawDepth> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }
}

/// RGB colour frame registered to the depth frame.
#[derive(Debug, Clone)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB8 pixels.
    pub data: Bytes,
}

impl ColorFrame {
    pub fn new(width: u32, height: u32, data: Bytes) -> Self {
        Self {
            width,
            height,
            data,
        }
    }
}

/// Pinhole intrinsics of the depth camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthIntrinsics {
    /// Focal length in pixels along X.
    pub fx: f32,
    /// Focal length in pixels along Y.
    pub fy: f32,
    /// Principal point X.
    pub cx: f32,
    /// Principal point Y.
    pub cy: f32,
}

impl Default for DepthIntrinsics {
    fn default() -> Self {
        // Kinect v1 depth camera at 640x480
        Self {
            fx: 580.0,
            fy: 580.0,
            cx: 320.0,
            cy: 240.0,
        }
    }
}

impl DepthIntrinsics {
    /// Camera-space point for pixel `(x, y)` at `depth`, or `None` without a return.
    pub fn world_coordinate_at(&self, x: f32, y: f32, depth: f32) -> Option<Vec3> {
        if depth <= 0.0 {
            return None;
        }
        Some(Vec3::new(
            (x - self.cx) * depth / self.fx,
            (y - self.cy) * depth / self.fy,
            depth,
        ))
    }
}

/// A depth sensor owned by the acquisition worker.
///
/// `next_depth_frame` blocks until a frame is available. `close` releases the
/// device; the worker calls it exactly once when its loop ends.
pub trait DepthSensor: Send {
    /// Frame size as `(width, height)`.
    fn size(&self) -> (u32, u32);

    /// Block until the next depth frame arrives.
    fn next_depth_frame(&mut self) -> Result<RawFrame, SensorError>;

    /// Colour frame matching the last depth frame, if the sensor has one.
    fn color_frame(&mut self) -> Option<ColorFrame>;

    fn intrinsics(&self) -> DepthIntrinsics {
        DepthIntrinsics::default()
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_frame_size_checked() {
        assert!(RawFrame::new(4, 2, vec![0; 8]).is_ok());
        let err = RawFrame::new(4, 2, vec![0; 7]).unwrap_err();
        assert_eq!(
            err,
            SensorError::SizeMismatch {
                expected: 8,
                actual: 7
            }
        );
    }

    #[test]
    fn test_world_coordinate_requires_depth() {
        let k = DepthIntrinsics::default();
        assert!(k.world_coordinate_at(10.0, 10.0, 0.0).is_none());

        let p = k.world_coordinate_at(320.0, 240.0, 1.0).unwrap();
        assert!(p.x.abs() < 1e-6);
        assert!(p.y.abs() < 1e-6);
        assert!((p.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_world_coordinate_off_centre() {
        let k = DepthIntrinsics {
            fx: 500.0,
            fy: 400.0,
            cx: 50.0,
            cy: 40.0,
        };
        let p = k.world_coordinate_at(60.0, 20.0, 1000.0).unwrap();
        assert!((p.x - 20.0).abs() < 1e-4);
        assert!((p.y + 50.0).abs() < 1e-4);
        assert_eq!(p.z, 1000.0);
    }

    #[test]
    fn test_oversized_dimensions_do_not_wrap() {
        // 65536 * 65536 wraps to zero in u32
        let err = RawFrame::new(65536, 65536, Vec::new()).unwrap_err();
        assert_eq!(
            err,
            SensorError::SizeMismatch {
                expected: 65536 * 65536,
                actual: 0
            }
        );
    }
}
