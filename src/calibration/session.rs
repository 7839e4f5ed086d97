//! Consumer-side calibration workflow.
//!
//! The session owns the calibration state between render ticks: detected
//! chessboard corners, collected point pairs, the solved transform, the base
//! plane and the ROI detection progress. Mode and ROI changes are queued and
//! picked up by the caller for the acquisition worker.

use std::path::Path;

use glam::{Vec2, Vec3, Vec4};

use super::chessboard::{ChessboardConfig, ChessboardDetector};
use super::projection::{CalibrationTransform, PointPair, ProjectionSolver};
use super::roi_detection::{sweep_roi, ContourFinder};
use super::state::{Mode, ModeEvent, RoiDetectionState};
use super::storage::CalibrationDocument;
use super::CalibrationError;
use crate::filter::{FilterConfig, FilteredFrame};
use crate::geometry::{BasePlane, ElevationRange, Roi};
use crate::sensor::{ColorFrame, DepthIntrinsics};
use crate::settings::{SandboxConfig, SandboxSettings};

/// Result of a successful point-pair commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Pairs added by this commit
    pub added: usize,
    /// Pairs collected so far
    pub total: usize,
}

/// Progress reported by [`CalibrationSession::update_roi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiStep {
    /// Not in ROI detection.
    Idle,
    /// Waiting for a filtered frame to sweep.
    Waiting,
    /// Frame captured, sweep runs on the next update.
    Sweeping,
    /// New ROI adopted and queued for the worker.
    Found(Roi),
}

/// A pixel mapped through the base plane and the projector transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeProjection {
    /// Sensor point: camera-space x, y and normalized depth
    pub vertex: Vec3,
    /// Height above the base plane in normalized units
    pub elevation: f32,
    /// Projector pixel
    pub projector: Vec2,
}

fn instable_sentinel(filter: &FilterConfig) -> Option<f32> {
    (!filter.retain_valids).then_some(filter.instable_value)
}

pub struct CalibrationSession {
    mode: Mode,
    roi_state: RoiDetectionState,
    chessboard: ChessboardConfig,
    solver: ProjectionSolver,
    pairs: Vec<PointPair>,
    transform: Option<CalibrationTransform>,
    corners: Option<Vec<Vec2>>,
    base_plane: BasePlane,
    elevation: ElevationRange,
    intrinsics: DepthIntrinsics,
    depth_norm: f32,
    /// Filtered value that marks an unstable pixel, when the filter outputs one
    instable_sentinel: Option<f32>,
    width: u32,
    height: u32,
    roi: Roi,
    test_point: (u32, u32),
    filtered: Option<FilteredFrame>,
    color: Option<ColorFrame>,
    pending_mode: Option<Mode>,
    pending_roi: Option<Roi>,
    message: String,
}

impl CalibrationSession {
    pub fn new(config: &SandboxConfig, width: u32, height: u32) -> Self {
        Self {
            mode: Mode::default(),
            roi_state: RoiDetectionState::default(),
            chessboard: config.chessboard.clone(),
            solver: ProjectionSolver::new(),
            pairs: Vec::new(),
            transform: None,
            corners: None,
            base_plane: config.base_plane.into(),
            elevation: config.elevation,
            intrinsics: config.intrinsics,
            depth_norm: config.filter.depth_norm,
            instable_sentinel: instable_sentinel(&config.filter),
            width,
            height,
            roi: Roi::full_frame(width, height),
            test_point: (width / 2, height / 2),
            filtered: None,
            color: None,
            pending_mode: None,
            pending_roi: None,
            message: String::new(),
        }
    }

    /// Use the intrinsics reported by the sensor.
    pub fn with_intrinsics(mut self, intrinsics: DepthIntrinsics) -> Self {
        self.intrinsics = intrinsics;
        self
    }

    /// Follow a filter reconfiguration on the worker.
    pub fn apply_filter_config(&mut self, filter: &FilterConfig) {
        self.depth_norm = filter.depth_norm;
        self.instable_sentinel = instable_sentinel(filter);
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn roi_state(&self) -> RoiDetectionState {
        self.roi_state
    }

    pub fn roi(&self) -> Roi {
        self.roi
    }

    pub fn pairs(&self) -> &[PointPair] {
        &self.pairs
    }

    pub fn transform(&self) -> Option<&CalibrationTransform> {
        self.transform.as_ref()
    }

    pub fn corners(&self) -> Option<&[Vec2]> {
        self.corners.as_deref()
    }

    pub fn chessboard(&self) -> &ChessboardConfig {
        &self.chessboard
    }

    pub fn base_plane(&self) -> &BasePlane {
        &self.base_plane
    }

    pub fn elevation(&self) -> &ElevationRange {
        &self.elevation
    }

    pub fn elevation_mut(&mut self) -> &mut ElevationRange {
        &mut self.elevation
    }

    pub fn test_point(&self) -> (u32, u32) {
        self.test_point
    }

    /// Latest status line for the operator.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn latest_filtered(&self) -> Option<&FilteredFrame> {
        self.filtered.as_ref()
    }

    pub fn update_filtered(&mut self, frame: FilteredFrame) {
        self.filtered = Some(frame);
    }

    pub fn update_color(&mut self, frame: ColorFrame) {
        self.color = Some(frame);
    }

    /// Mode change not yet sent to the worker.
    pub fn take_mode_update(&mut self) -> Option<Mode> {
        self.pending_mode.take()
    }

    /// ROI change not yet sent to the worker.
    pub fn take_roi_update(&mut self) -> Option<Roi> {
        self.pending_roi.take()
    }

    fn report(&mut self, message: impl Into<String>) {
        self.message = message.into();
        log::info!("{}", self.message);
    }

    fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            log::info!("Mode: {} -> {}", self.mode, mode);
            self.mode = mode;
            self.pending_mode = Some(mode);
        }
    }

    /// Apply a mode event. Starting ROI detection needs detected corners.
    pub fn handle_event(&mut self, event: ModeEvent) -> Result<Mode, CalibrationError> {
        if event == ModeEvent::StartRoiDetection {
            if self.corners.as_ref().map_or(true, |c| c.is_empty()) {
                self.report("ROI detection needs the chessboard corners, detect them first");
                return Err(CalibrationError::RoiDetectionNoInput);
            }
            self.roi_state = RoiDetectionState::Init;
        }
        self.set_mode(self.mode.apply(event));
        Ok(self.mode)
    }

    /// Replace the ROI and queue it for the worker.
    pub fn set_roi(&mut self, roi: Roi) {
        self.roi = roi.standardized().clamped(self.width, self.height);
        self.pending_roi = Some(self.roi);
    }

    /// Look for the chessboard in the latest colour frame.
    pub fn detect_corners(
        &mut self,
        detector: &mut dyn ChessboardDetector,
    ) -> Result<&[Vec2], CalibrationError> {
        let found = self
            .color
            .as_ref()
            .and_then(|color| detector.find_corners(color, self.chessboard.pattern_size()))
            .filter(|c| c.len() == self.chessboard.corner_count());
        self.corners = found;
        self.corners.as_deref().ok_or(CalibrationError::NoChessboard)
    }

    /// Sensor point for pixel `(x, y)` at normalized depth `depth`.
    fn sensor_point(&self, x: f32, y: f32, depth: f32) -> Option<Vec3> {
        let camera = self
            .intrinsics
            .world_coordinate_at(x, y, depth * self.depth_norm)?;
        Some(Vec3::new(camera.x, camera.y, depth))
    }

    /// Stable filtered depth at `(x, y)`. Empty pixels and the instable
    /// sentinel count as unknown.
    fn stable_depth(&self, frame: &FilteredFrame, x: u32, y: u32) -> Option<f32> {
        frame
            .depth_at(x, y)
            .filter(|&d| self.instable_sentinel != Some(d))
    }

    fn corner_point(&self, frame: &FilteredFrame, p: Vec2) -> Option<Vec3> {
        if p.x < 0.0 || p.y < 0.0 {
            return None;
        }
        let depth = self.stable_depth(frame, p.x.round() as u32, p.y.round() as u32)?;
        self.sensor_point(p.x, p.y, depth)
    }

    /// Pair every detected corner with its projector point.
    ///
    /// All corners need a stable depth; otherwise nothing is stored.
    pub fn commit_point_pairs(&mut self) -> Result<CommitOutcome, CalibrationError> {
        let corners = self.corners.as_ref().ok_or(CalibrationError::NoChessboard)?;
        let frame = self.filtered.as_ref().ok_or(CalibrationError::NoFilteredFrame)?;
        let projector = self.chessboard.projector_points();
        let required = projector.len();

        let sensor: Vec<Vec3> = corners
            .iter()
            .filter_map(|&c| self.corner_point(frame, c))
            .collect();

        if corners.len() != required || sensor.len() != required {
            let valid = sensor.len();
            self.report(
                "Points not added because not all chessboard points' depth known. Try re-positioning.",
            );
            return Err(CalibrationError::InputIncomplete { valid, required });
        }

        self.pairs
            .extend(sensor.into_iter().zip(projector).map(|(s, p)| PointPair::new(s, p)));
        self.report(format!("Added {} points pairs.", required));
        Ok(CommitOutcome {
            added: required,
            total: self.pairs.len(),
        })
    }

    pub fn clear_point_pairs(&mut self) {
        self.pairs.clear();
        self.report("Cleared point pairs.");
    }

    /// Solve the transform from all pairs. The previous transform stays on failure.
    pub fn calibrate(&mut self) -> Result<&CalibrationTransform, CalibrationError> {
        match self.solver.solve(&self.pairs) {
            Ok(transform) => {
                self.report(format!(
                    "Calibrated from {} point pairs, rms error {:.2}px",
                    transform.pair_count, transform.rms_error
                ));
                Ok(&*self.transform.insert(transform))
            }
            Err(e) => {
                self.report(format!("Calibration failed: {}", e));
                Err(e)
            }
        }
    }

    /// Move the probe pixel, clamped to the frame.
    pub fn set_test_point(&mut self, x: i32, y: i32) {
        let max_x = self.width.saturating_sub(1) as i32;
        let max_y = self.height.saturating_sub(1) as i32;
        self.test_point = (x.clamp(0, max_x) as u32, y.clamp(0, max_y) as u32);
    }

    /// Map pixel `(x, y)` of the latest filtered frame to the projector.
    ///
    /// `None` without a transform or without a stable depth at the pixel.
    pub fn project_pixel(&self, x: u32, y: u32) -> Option<ProbeProjection> {
        let transform = self.transform.as_ref()?;
        let depth = self.stable_depth(self.filtered.as_ref()?, x, y)?;
        let vertex = self.sensor_point(x as f32, y as f32, depth)?;
        let elevation = self.base_plane.equation(self.depth_norm).dot(vertex.extend(1.0));
        let projector = transform.project(vertex)?;
        Some(ProbeProjection {
            vertex,
            elevation,
            projector,
        })
    }

    pub fn project_test_point(&self) -> Option<ProbeProjection> {
        self.project_pixel(self.test_point.0, self.test_point.1)
    }

    pub fn project_roi_center(&self) -> Option<ProbeProjection> {
        let c = self.roi.center();
        self.project_pixel(c.x.max(0.0) as u32, c.y.max(0.0) as u32)
    }

    /// Advance ROI detection by one step.
    ///
    /// On failure the ROI is unchanged and the mode returns to point collection.
    pub fn update_roi(&mut self, finder: &mut dyn ContourFinder) -> Result<RoiStep, CalibrationError> {
        if !self.mode.is_detecting_roi() {
            return Ok(RoiStep::Idle);
        }

        match self.roi_state {
            RoiDetectionState::Init => {
                if self.filtered.is_none() {
                    return Ok(RoiStep::Waiting);
                }
                self.roi_state = RoiDetectionState::MoveUp;
                Ok(RoiStep::Sweeping)
            }
            RoiDetectionState::MoveUp => {
                let frame = self.filtered.as_ref().ok_or(CalibrationError::NoFilteredFrame)?;
                let corners = self.corners.as_deref().unwrap_or(&[]);
                match sweep_roi(frame, corners, finder) {
                    Ok(result) => {
                        self.set_roi(result.roi);
                        self.roi_state = RoiDetectionState::Done;
                        self.report(format!("ROI set to {}", self.roi));
                        self.set_mode(self.mode.apply(ModeEvent::RoiDetectionFinished));
                        Ok(RoiStep::Found(self.roi))
                    }
                    Err(e) => {
                        self.roi_state = RoiDetectionState::Init;
                        self.report(format!("ROI detection failed: {}", e));
                        self.set_mode(self.mode.apply(ModeEvent::RoiDetectionFailed));
                        Err(e)
                    }
                }
            }
            RoiDetectionState::Done => Ok(RoiStep::Idle),
        }
    }

    pub fn nudge_plane(&mut self, steps: f32) {
        self.base_plane.nudge_offset(steps);
    }

    pub fn tilt_plane_x(&mut self, steps: f32) {
        self.base_plane.tilt_x(steps);
    }

    pub fn tilt_plane_y(&mut self, steps: f32) {
        self.base_plane.tilt_y(steps);
    }

    /// Plane equation for normalized-depth vertices.
    pub fn plane_equation(&self) -> Vec4 {
        self.base_plane.equation(self.depth_norm)
    }

    pub fn resize_chessboard(&mut self, steps: i32) {
        self.chessboard.resize(steps);
        self.corners = None;
    }

    pub fn move_chessboard(&mut self, x: i32, y: i32) {
        self.chessboard.move_to(x, y);
        self.corners = None;
    }

    /// Write point pairs and transform. Returns `false` on failure.
    pub fn save_calibration(&mut self, path: &Path) -> bool {
        let document = CalibrationDocument::new(&self.pairs, self.transform.as_ref());
        match document.save(path) {
            Ok(()) => {
                self.report(format!("Saved calibration to {}", path.display()));
                true
            }
            Err(e) => {
                self.report(format!("Could not save calibration to {}: {}", path.display(), e));
                false
            }
        }
    }

    /// Replace pairs and transform from a document. Returns `false` and keeps
    /// the current calibration if it cannot be read.
    pub fn load_calibration(&mut self, path: &Path) -> bool {
        match CalibrationDocument::load(path) {
            Ok(document) => {
                self.pairs = document.pairs();
                self.transform = document.transform();
                self.report(format!(
                    "Loaded {} point pairs from {}",
                    self.pairs.len(),
                    path.display()
                ));
                true
            }
            Err(e) => {
                self.report(format!("Could not load calibration from {}: {}", path.display(), e));
                false
            }
        }
    }

    /// Start-up load: with a usable transform the session goes straight to
    /// the sandbox.
    pub fn restore_calibration(&mut self, path: &Path) -> bool {
        if !self.load_calibration(path) {
            return false;
        }
        if self.transform.is_some() {
            self.set_mode(self.mode.apply(ModeEvent::CalibrationLoaded));
        }
        true
    }

    /// Write ROI and base plane. Returns `false` on failure.
    pub fn save_settings(&mut self, path: &Path) -> bool {
        let settings = SandboxSettings::new(self.roi, self.base_plane, self.depth_norm);
        match settings.save_to_file(path) {
            Ok(()) => true,
            Err(e) => {
                self.report(format!("Could not save settings to {}: {}", path.display(), e));
                false
            }
        }
    }

    /// Restore ROI and base plane; the ROI is queued for the worker.
    pub fn load_settings(&mut self, path: &Path) -> bool {
        match SandboxSettings::load_from_file(path) {
            Ok(settings) => {
                self.base_plane = settings.base_plane.into();
                self.set_roi(settings.roi);
                log::info!("Loaded settings from {}: ROI {}", path.display(), self.roi);
                true
            }
            Err(e) => {
                self.report(format!("Could not load settings from {}: {}", path.display(), e));
                false
            }
        }
    }
}
