//! Operating mode state machine.

use std::fmt;

/// Top-level operating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneralState {
    /// Calibration workflow is running.
    #[default]
    Calibration,
    /// Normal sandbox display.
    Sandbox,
}

/// Step of the calibration workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationState {
    /// Collecting chessboard point pairs.
    #[default]
    ProjectorKinectCalibration,
    /// Projecting a probe point through the solved transform.
    CalibrationTest,
    /// Detecting the sandbox ROI.
    RoiDetermination,
}

/// Step of the ROI auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoiDetectionState {
    /// Detection requested, sweep not run yet.
    #[default]
    Init,
    /// Threshold sweep in progress.
    MoveUp,
    /// New ROI adopted.
    Done,
}

impl fmt::Display for GeneralState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneralState::Calibration => write!(f, "Calibration"),
            GeneralState::Sandbox => write!(f, "Sandbox"),
        }
    }
}

impl fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationState::ProjectorKinectCalibration => write!(f, "Projector/Sensor Calibration"),
            CalibrationState::CalibrationTest => write!(f, "Calibration Test"),
            CalibrationState::RoiDetermination => write!(f, "ROI Determination"),
        }
    }
}

impl fmt::Display for RoiDetectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoiDetectionState::Init => write!(f, "Init"),
            RoiDetectionState::MoveUp => write!(f, "Sweeping"),
            RoiDetectionState::Done => write!(f, "Done"),
        }
    }
}

/// Inputs that move the mode state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// Switch between point collection and calibration test.
    ToggleCalibrationTest,
    /// Switch between calibration and sandbox display.
    ToggleSandbox,
    /// Begin ROI auto-detection.
    StartRoiDetection,
    /// ROI detection adopted a new ROI.
    RoiDetectionFinished,
    /// ROI detection gave up without a new ROI.
    RoiDetectionFailed,
    /// A saved calibration was loaded at start-up.
    CalibrationLoaded,
}

/// Current mode as sent to the acquisition worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mode {
    pub general: GeneralState,
    pub calibration: CalibrationState,
}

impl Mode {
    pub fn new(general: GeneralState, calibration: CalibrationState) -> Self {
        Self {
            general,
            calibration,
        }
    }

    pub fn is_sandbox(&self) -> bool {
        self.general == GeneralState::Sandbox
    }

    pub fn is_calibrating(&self) -> bool {
        self.general == GeneralState::Calibration
    }

    pub fn is_detecting_roi(&self) -> bool {
        self.is_calibrating() && self.calibration == CalibrationState::RoiDetermination
    }

    /// Mode after `event`.
    pub fn apply(self, event: ModeEvent) -> Mode {
        use CalibrationState::*;
        use GeneralState::*;

        match event {
            ModeEvent::ToggleCalibrationTest => {
                let calibration = match self.calibration {
                    CalibrationTest => ProjectorKinectCalibration,
                    ProjectorKinectCalibration => CalibrationTest,
                    RoiDetermination => RoiDetermination,
                };
                Mode::new(Calibration, calibration)
            }
            ModeEvent::ToggleSandbox => {
                let general = match self.general {
                    Calibration => Sandbox,
                    Sandbox => Calibration,
                };
                Mode::new(general, self.calibration)
            }
            ModeEvent::StartRoiDetection => Mode::new(Calibration, RoiDetermination),
            ModeEvent::RoiDetectionFinished => Mode::new(Calibration, CalibrationTest),
            ModeEvent::RoiDetectionFailed => Mode::new(Calibration, ProjectorKinectCalibration),
            ModeEvent::CalibrationLoaded => Mode::new(Sandbox, self.calibration),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.general {
            GeneralState::Sandbox => write!(f, "Sandbox"),
            GeneralState::Calibration => write!(f, "Calibration: {}", self.calibration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        let mode = Mode::default();
        assert!(mode.is_calibrating());
        assert_eq!(mode.calibration, CalibrationState::ProjectorKinectCalibration);
        assert_eq!(RoiDetectionState::default(), RoiDetectionState::Init);
    }

    #[test]
    fn test_toggle_calibration_test() {
        let mode = Mode::default().apply(ModeEvent::ToggleCalibrationTest);
        assert_eq!(mode.calibration, CalibrationState::CalibrationTest);
        let mode = mode.apply(ModeEvent::ToggleCalibrationTest);
        assert_eq!(mode.calibration, CalibrationState::ProjectorKinectCalibration);

        // Forces calibration mode, leaves ROI detection alone
        let detecting = Mode::new(GeneralState::Sandbox, CalibrationState::RoiDetermination);
        let mode = detecting.apply(ModeEvent::ToggleCalibrationTest);
        assert_eq!(
            mode,
            Mode::new(GeneralState::Calibration, CalibrationState::RoiDetermination)
        );
    }

    #[test]
    fn test_toggle_sandbox_keeps_sub_state() {
        let start = Mode::new(GeneralState::Calibration, CalibrationState::CalibrationTest);
        let sandbox = start.apply(ModeEvent::ToggleSandbox);
        assert!(sandbox.is_sandbox());
        assert_eq!(sandbox.calibration, CalibrationState::CalibrationTest);
        assert_eq!(sandbox.apply(ModeEvent::ToggleSandbox), start);
    }

    #[test]
    fn test_roi_detection_transitions() {
        let detecting = Mode::new(GeneralState::Sandbox, CalibrationState::CalibrationTest)
            .apply(ModeEvent::StartRoiDetection);
        assert!(detecting.is_detecting_roi());

        let done = detecting.apply(ModeEvent::RoiDetectionFinished);
        assert_eq!(
            done,
            Mode::new(GeneralState::Calibration, CalibrationState::CalibrationTest)
        );

        let failed = detecting.apply(ModeEvent::RoiDetectionFailed);
        assert_eq!(failed.calibration, CalibrationState::ProjectorKinectCalibration);
    }

    #[test]
    fn test_calibration_loaded_goes_to_sandbox() {
        let mode = Mode::default().apply(ModeEvent::CalibrationLoaded);
        assert!(mode.is_sandbox());
    }

    #[test]
    fn test_display() {
        assert_eq!(Mode::default().to_string(), "Calibration: Projector/Sensor Calibration");
        assert_eq!(
            Mode::new(GeneralState::Sandbox, CalibrationState::CalibrationTest).to_string(),
            "Sandbox"
        );
    }
}
