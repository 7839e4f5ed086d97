//! Telemetry and logging infrastructure
//!
//! Provides structured logging with tracing and acquisition timing statistics.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogGuard};
pub use metrics::{AcquisitionStats, DropCounters, FrameProfiler, FrameStats};
