//! Background depth acquisition
//!
//! One worker thread owns the sensor and the filter pipeline. Results go to
//! the consumer over single-slot channels; mode, ROI and commands come back
//! over small control channels and are applied between frames.

mod channels;
mod worker;

pub use channels::{control_channels, ControlLink, ControlReceivers, WorkerCommand};
pub use worker::AcquisitionWorker;
