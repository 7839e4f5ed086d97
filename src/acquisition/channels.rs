//! Consumer-to-worker control channels.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::calibration::Mode;
use crate::filter::FilterConfig;
use crate::geometry::Roi;

/// Pending updates per control channel before `try_send` gives up.
const CONTROL_CAPACITY: usize = 4;

/// Commands for the worker besides mode and ROI changes.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    /// Zero all filter statistics
    ResetBuffers,
    /// Replace the filter tuning (also resets the buffers)
    Reconfigure(FilterConfig),
}

/// Consumer side of the control channels.
#[derive(Clone)]
pub struct ControlLink {
    mode_tx: Sender<Mode>,
    roi_tx: Sender<Roi>,
    command_tx: Sender<WorkerCommand>,
}

/// Worker side of the control channels.
pub struct ControlReceivers {
    pub(crate) mode_rx: Receiver<Mode>,
    pub(crate) roi_rx: Receiver<Roi>,
    pub(crate) command_rx: Receiver<WorkerCommand>,
}

/// Create a linked pair of control endpoints.
pub fn control_channels() -> (ControlLink, ControlReceivers) {
    let (mode_tx, mode_rx) = bounded(CONTROL_CAPACITY);
    let (roi_tx, roi_rx) = bounded(CONTROL_CAPACITY);
    let (command_tx, command_rx) = bounded(CONTROL_CAPACITY);
    (
        ControlLink {
            mode_tx,
            roi_tx,
            command_tx,
        },
        ControlReceivers {
            mode_rx,
            roi_rx,
            command_rx,
        },
    )
}

fn try_send<T>(tx: &Sender<T>, value: T, what: &str) -> bool {
    match tx.try_send(value) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            log::warn!("Worker has not picked up earlier {} updates, dropping this one", what);
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            log::warn!("Acquisition worker is gone, {} update not delivered", what);
            false
        }
    }
}

impl ControlLink {
    /// Queue a mode change. Returns `false` if it could not be queued.
    pub fn send_mode(&self, mode: Mode) -> bool {
        try_send(&self.mode_tx, mode, "mode")
    }

    /// Queue a new ROI. Returns `false` if it could not be queued.
    pub fn send_roi(&self, roi: Roi) -> bool {
        try_send(&self.roi_tx, roi, "ROI")
    }

    /// Queue a command. Returns `false` if it could not be queued.
    pub fn send_command(&self, command: WorkerCommand) -> bool {
        try_send(&self.command_tx, command, "command")
    }
}
