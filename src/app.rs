//! Consumer side of the sandbox: drains the worker every tick and keeps the
//! calibration session and the worker in step.

use std::path::Path;

use crate::acquisition::{control_channels, AcquisitionWorker, ControlLink, WorkerCommand};
use crate::calibration::{CalibrationError, CalibrationSession, ContourFinder, RoiStep};
use crate::filter::{FilterConfig, GradientField};
use crate::sensor::{DepthSensor, SensorError};
use crate::settings::SandboxConfig;
use crate::telemetry::AcquisitionStats;

/// Sandbox application without a renderer.
pub struct SandboxApp {
    config: SandboxConfig,
    worker: AcquisitionWorker,
    link: ControlLink,
    session: CalibrationSession,
    gradient: Option<GradientField>,
    last_error: Option<SensorError>,
    frames_handled: u64,
}

impl SandboxApp {
    /// Spawn the acquisition worker for `sensor`.
    pub fn start<S>(sensor: S, config: SandboxConfig) -> std::io::Result<Self>
    where
        S: DepthSensor + 'static,
    {
        let (link, control) = control_channels();
        let worker = AcquisitionWorker::spawn(sensor, config.filter.clone(), control)?;
        let (width, height) = worker.size();
        let session =
            CalibrationSession::new(&config, width, height).with_intrinsics(worker.intrinsics());

        Ok(Self {
            config,
            worker,
            link,
            session,
            gradient: None,
            last_error: None,
            frames_handled: 0,
        })
    }

    /// Load the saved calibration and settings named in the configuration,
    /// resolved against `dir`. Missing files are skipped.
    pub fn restore(&mut self, dir: &Path) {
        let calibration = dir.join(&self.config.calibration_file);
        if calibration.exists() && self.session.restore_calibration(&calibration) {
            log::info!("Calibration restored, starting in {}", self.session.mode());
        }
        let settings = dir.join(&self.config.settings_file);
        if settings.exists() {
            self.session.load_settings(&settings);
        }
        self.forward_updates();
    }

    /// Persist calibration and settings into `dir`.
    pub fn persist(&mut self, dir: &Path) -> bool {
        let calibration = dir.join(&self.config.calibration_file);
        let settings = dir.join(&self.config.settings_file);
        let saved_calibration = self.session.save_calibration(&calibration);
        self.session.save_settings(&settings) && saved_calibration
    }

    /// Drain every worker channel once and forward pending session updates.
    pub fn tick(&mut self) {
        if let Some(frame) = self.worker.try_receive_filtered() {
            self.session.update_filtered(frame);
            self.worker.frame_done();
            self.frames_handled += 1;
        }
        if let Some(color) = self.worker.try_receive_color() {
            self.session.update_color(color);
        }
        if let Some(gradient) = self.worker.try_receive_gradient() {
            self.gradient = Some(gradient);
        }
        if let Some(error) = self.worker.try_receive_error() {
            log::error!("Acquisition stopped: {}", error);
            self.last_error = Some(error);
        }
        self.forward_updates();
    }

    /// Advance ROI detection and forward its result.
    pub fn detect_roi(&mut self, finder: &mut dyn ContourFinder) -> Result<RoiStep, CalibrationError> {
        let step = self.session.update_roi(finder);
        self.forward_updates();
        step
    }

    fn forward_updates(&mut self) {
        if let Some(mode) = self.session.take_mode_update() {
            self.link.send_mode(mode);
        }
        if let Some(roi) = self.session.take_roi_update() {
            self.link.send_roi(roi);
        }
    }

    pub fn reset_filter(&self) -> bool {
        self.link.send_command(WorkerCommand::ResetBuffers)
    }

    pub fn reconfigure_filter(&mut self, filter: FilterConfig) -> bool {
        let sent = self.link.send_command(WorkerCommand::Reconfigure(filter.clone()));
        if sent {
            self.session.apply_filter_config(&filter);
            self.config.filter = filter;
        }
        sent
    }

    pub fn session(&self) -> &CalibrationSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut CalibrationSession {
        &mut self.session
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn gradient(&self) -> Option<&GradientField> {
        self.gradient.as_ref()
    }

    pub fn last_error(&self) -> Option<&SensorError> {
        self.last_error.as_ref()
    }

    pub fn frames_handled(&self) -> u64 {
        self.frames_handled
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.worker.stats()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Stop the worker and release the sensor.
    pub fn shutdown(mut self) {
        self.worker.stop();
    }
}
