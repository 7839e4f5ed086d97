//! Projector/sensor calibration workflow
//!
//! - Chessboard point-pair collection and the least-squares projector transform
//! - Calibration test through a probe pixel
//! - ROI auto-detection by threshold sweep over the filtered frame
//! - The mode state machine shared with the acquisition worker

mod chessboard;
mod projection;
mod roi_detection;
mod session;
mod state;
mod storage;

pub use chessboard::{ChessboardConfig, ChessboardDetector, FixedCorners};
pub use projection::{CalibrationTransform, PointPair, ProjectionSolver};
pub use roi_detection::{sweep_roi, ContourFinder, ContourParams, SweepResult};
pub use session::{CalibrationSession, CommitOutcome, ProbeProjection, RoiStep};
pub use state::{CalibrationState, GeneralState, Mode, ModeEvent, RoiDetectionState};
pub use storage::CalibrationDocument;

use thiserror::Error;

use crate::settings::SettingsError;

/// Recoverable calibration failures.
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Points not added: {valid} of {required} chessboard corners have a known depth")]
    InputIncomplete { valid: usize, required: usize },
    #[error("Chessboard not found in the colour frame")]
    NoChessboard,
    #[error("Calibration could not be solved: {0}")]
    Unsolvable(String),
    #[error("ROI detection needs detected chessboard corners")]
    RoiDetectionNoInput,
    #[error("No contour around the chessboard at any threshold")]
    RoiNotFound,
    #[error("No filtered frame available yet")]
    NoFilteredFrame,
    #[error("Calibration file error: {0}")]
    Persistence(#[from] SettingsError),
}
