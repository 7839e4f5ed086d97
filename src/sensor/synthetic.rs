//! Scripted depth sensor for the headless runner and tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::{ColorFrame, DepthIntrinsics, DepthSensor, RawDepth, RawFrame, SensorError};

/// What the sensor does once its scripted frames run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptEnd {
    /// Keep returning the last frame.
    RepeatLast,
    /// Report a disconnect.
    Disconnect,
}

/// Depth sensor replaying a fixed list of frames.
pub struct SyntheticSensor {
    width: u32,
    height: u32,
    frames: VecDeque<RawFrame>,
    last: Option<RawFrame>,
    end: ScriptEnd,
    frame_interval: Duration,
    frame_counter: u64,
    with_color: bool,
    intrinsics: DepthIntrinsics,
    closed: Arc<AtomicBool>,
}

impl SyntheticSensor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frames: VecDeque::new(),
            last: None,
            end: ScriptEnd::RepeatLast,
            frame_interval: Duration::ZERO,
            frame_counter: 0,
            with_color: true,
            intrinsics: DepthIntrinsics::default(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sensor that sees a flat surface at `depth` forever.
    pub fn flat(width: u32, height: u32, depth: RawDepth) -> Self {
        let mut sensor = Self::new(width, height);
        sensor.push_frame(RawFrame::filled(width, height, depth));
        sensor
    }

    pub fn push_frame(&mut self, frame: RawFrame) {
        self.frames.push_back(frame);
    }

    pub fn with_script_end(mut self, end: ScriptEnd) -> Self {
        self.end = end;
        self
    }

    /// Sleep between frames to mimic a real frame rate.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_color(mut self, enabled: bool) -> Self {
        self.with_color = enabled;
        self
    }

    pub fn with_intrinsics(mut self, intrinsics: DepthIntrinsics) -> Self {
        self.intrinsics = intrinsics;
        self
    }

    /// Flag that flips to `true` once the worker released the sensor.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl DepthSensor for SyntheticSensor {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_depth_frame(&mut self) -> Result<RawFrame, SensorError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SensorError::Unavailable("sensor closed".to_string()));
        }
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval);
        }

        let frame = match self.frames.pop_front() {
            Some(frame) => frame,
            None => match (self.end, self.last.as_ref()) {
                (ScriptEnd::RepeatLast, Some(last)) => last.clone(),
                _ => return Err(SensorError::Disconnected),
            },
        };

        if frame.width != self.width || frame.height != self.height {
            return Err(SensorError::SizeMismatch {
                expected: self.width as usize * self.height as usize,
                actual: frame.data.len(),
            });
        }

        self.frame_counter += 1;
        self.last = Some(frame.clone());
        Ok(frame.with_frame_number(self.frame_counter))
    }

    fn color_frame(&mut self) -> Option<ColorFrame> {
        if !self.with_color {
            return None;
        }
        let depth = self.last.as_ref()?;
        // Grey ramp of the depth so detectors have something to look at
        let mut data = Vec::with_capacity(depth.data.len() * 3);
        for &d in &depth.data {
            let v = (d >> 4).min(255) as u8;
            data.extend_from_slice(&[v, v, v]);
        }
        Some(ColorFrame::new(self.width, self.height, Bytes::from(data)))
    }

    fn intrinsics(&self) -> DepthIntrinsics {
        self.intrinsics
    }

    fn close(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            log::info!("Synthetic sensor closed after {} frames", self.frame_counter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeats_last_frame() {
        let mut sensor = SyntheticSensor::flat(4, 4, 900);
        for expected in 1..=3 {
            let frame = sensor.next_depth_frame().unwrap();
            assert_eq!(frame.frame_number, expected);
            assert!(frame.data.iter().all(|&d| d == 900));
        }
    }

    #[test]
    fn test_disconnects_when_script_ends() {
        let mut sensor = SyntheticSensor::flat(2, 2, 10).with_script_end(ScriptEnd::Disconnect);
        assert!(sensor.next_depth_frame().is_ok());
        assert_eq!(sensor.next_depth_frame().unwrap_err(), SensorError::Disconnected);
    }

    #[test]
    fn test_close_sets_flag() {
        let mut sensor = SyntheticSensor::new(2, 2);
        let closed = sensor.closed_flag();
        sensor.close();
        assert!(closed.load(Ordering::Acquire));
        assert!(sensor.next_depth_frame().is_err());
    }
}
