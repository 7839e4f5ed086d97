//! AR Sandbox core
//!
//! Turns noisy depth frames from a 3D sensor into a stable elevation map and
//! calibrates the sensor against a projector:
//! - Per-pixel temporal filtering with stability detection and hysteresis
//! - Optional spatial smoothing and a coarse gradient field
//! - A background acquisition worker talking to the consumer over bounded channels
//! - Chessboard-based projector calibration and automatic ROI detection

pub mod acquisition;
pub mod app;
pub mod calibration;
pub mod filter;
pub mod geometry;
pub mod sensor;
pub mod settings;
pub mod telemetry;

pub use acquisition::{AcquisitionWorker, ControlLink};
pub use app::SandboxApp;
pub use calibration::{CalibrationSession, Mode};
pub use filter::{FilterConfig, FrameFilterPipeline};
pub use geometry::Roi;
pub use settings::SandboxConfig;
