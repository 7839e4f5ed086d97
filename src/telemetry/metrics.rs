//! Acquisition timing and counters
//!
//! The worker keeps a `FrameProfiler` for its processing times and publishes
//! an `AcquisitionStats` snapshot the consumer can read at any time.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::calibration::Mode;
use crate::geometry::Roi;

/// Frame timing statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Average processing time in milliseconds
    pub avg_ms: f64,
    /// Minimum processing time in milliseconds
    pub min_ms: f64,
    /// Maximum processing time in milliseconds
    pub max_ms: f64,
    /// 50th percentile (median) processing time
    pub p50_ms: f64,
    /// 95th percentile processing time
    pub p95_ms: f64,
    /// 99th percentile processing time
    pub p99_ms: f64,
    /// Number of samples in the statistics
    pub sample_count: usize,
}

/// Frame profiler for filter timing
///
/// Keeps the processing time of the last `max_samples` frames and the
/// arrival time of each frame for FPS.
pub struct FrameProfiler {
    /// Processing durations
    frame_times: VecDeque<Duration>,
    /// Maximum samples to keep (10 seconds at 30fps)
    max_samples: usize,
    /// Frame arrival times for FPS calculation
    frame_starts: VecDeque<Instant>,
}

impl Default for FrameProfiler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameProfiler {
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::with_capacity(300),
            max_samples: 300,
            frame_starts: VecDeque::with_capacity(300),
        }
    }

    /// Mark the arrival of a frame.
    pub fn begin_frame(&mut self) -> Instant {
        let now = Instant::now();
        self.frame_starts.push_back(now);
        if self.frame_starts.len() > self.max_samples {
            self.frame_starts.pop_front();
        }
        now
    }

    /// Record how long the frame started at `start` took to process.
    pub fn end_frame(&mut self, start: Instant) {
        self.record(start.elapsed());
    }

    pub fn record(&mut self, duration: Duration) {
        self.frame_times.push_back(duration);
        if self.frame_times.len() > self.max_samples {
            self.frame_times.pop_front();
        }
    }

    /// Get processing time statistics
    pub fn stats(&self) -> FrameStats {
        if self.frame_times.is_empty() {
            return FrameStats::default();
        }

        let mut times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let sum: f64 = times.iter().sum();
        let count = times.len() as f64;

        FrameStats {
            avg_ms: sum / count,
            min_ms: times.first().copied().unwrap_or(0.0),
            max_ms: times.last().copied().unwrap_or(0.0),
            p50_ms: percentile(&times, 0.50),
            p95_ms: percentile(&times, 0.95),
            p99_ms: percentile(&times, 0.99),
            sample_count: times.len(),
        }
    }

    /// Frames per second over the kept window
    pub fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.frame_starts.front(), self.frame_starts.back()) else {
            return 0.0;
        };
        if self.frame_starts.len() < 2 {
            return 0.0;
        }
        let duration = last.duration_since(*first).as_secs_f64();
        if duration > 0.0 {
            (self.frame_starts.len() - 1) as f64 / duration
        } else {
            0.0
        }
    }
}

/// Calculate percentile from sorted array
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p) as usize;
    sorted[idx]
}

/// Outputs skipped because the consumer had not drained the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounters {
    pub filtered: u64,
    pub color: u64,
    pub gradient: u64,
}

impl DropCounters {
    pub fn total(&self) -> u64 {
        self.filtered + self.color + self.gradient
    }
}

/// Snapshot of the acquisition worker
#[derive(Debug, Clone, Default)]
pub struct AcquisitionStats {
    /// Raw frames read from the sensor
    pub frames_acquired: u64,
    /// Filtered frames handed to the consumer
    pub frames_published: u64,
    /// Outputs skipped per channel
    pub dropped: DropCounters,
    /// Filtered frames delivered but not yet handled by the consumer
    pub frames_in_flight: i64,
    /// Filter processing times
    pub processing: FrameStats,
    /// Sensor frame rate seen by the worker
    pub fps: f64,
    /// Mode the worker currently runs in
    pub mode: Mode,
    /// ROI the filter currently uses
    pub roi: Option<Roi>,
    /// Whether the filter has produced its first settled image
    pub first_image_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_profiler() {
        let mut profiler = FrameProfiler::new();
        for ms in [4, 2, 6] {
            profiler.record(Duration::from_millis(ms));
        }

        let stats = profiler.stats();
        assert_eq!(stats.sample_count, 3);
        assert!((stats.avg_ms - 4.0).abs() < 1e-9);
        assert!((stats.min_ms - 2.0).abs() < 1e-9);
        assert!((stats.max_ms - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_profiler_window_is_bounded() {
        let mut profiler = FrameProfiler::new();
        for _ in 0..400 {
            profiler.record(Duration::from_millis(1));
        }
        assert_eq!(profiler.stats().sample_count, 300);
    }

    #[test]
    fn test_fps_needs_two_frames() {
        let mut profiler = FrameProfiler::new();
        assert_eq!(profiler.fps(), 0.0);
        profiler.begin_frame();
        assert_eq!(profiler.fps(), 0.0);
        std::thread::sleep(Duration::from_millis(5));
        profiler.begin_frame();
        assert!(profiler.fps() > 0.0);
    }

    #[test]
    fn test_percentile() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&values, 0.5), 5.0);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 1.0), 10.0);
    }

    #[test]
    fn test_drop_total() {
        let dropped = DropCounters {
            filtered: 1,
            color: 2,
            gradient: 3,
        };
        assert_eq!(dropped.total(), 6);
    }
}
