//! Clip, temporal, spatial and gradient passes over one raw frame.

use super::frame::FilteredFrame;
use super::gradient::GradientField;
use super::stats::StatBuffer;
use super::{spatial, temporal, FilterConfig};
use crate::geometry::Roi;
use crate::sensor::{ColorFrame, RawFrame, SensorError};

/// Everything produced from one raw frame.
#[derive(Debug, Clone)]
pub struct FilterOutput {
    pub filtered: FilteredFrame,
    pub color: Option<ColorFrame>,
    pub gradient: GradientField,
}

/// Owns all per-pixel filter state for one frame size.
///
/// The acquisition worker is the only owner, so resets and reconfiguration
/// never overlap with `process_frame`.
pub struct FrameFilterPipeline {
    config: FilterConfig,
    width: u32,
    height: u32,
    roi: Roi,
    buffer: StatBuffer,
    samples: Vec<f32>,
    temporal_out: Vec<f32>,
    frames_since_reset: u32,
    first_image_ready: bool,
}

impl FrameFilterPipeline {
    pub fn new(width: u32, height: u32, config: FilterConfig) -> Self {
        let config = config.validated();
        let pixels = width as usize * height as usize;
        log::debug!(
            "Frame filter {}x{}: {} averaging slots, min {} samples",
            width,
            height,
            config.averaging_slots,
            config.min_num_samples
        );
        Self {
            buffer: StatBuffer::new(width, height, config.averaging_slots),
            config,
            width,
            height,
            roi: Roi::full_frame(width, height),
            samples: vec![0.0; pixels],
            temporal_out: vec![0.0; pixels],
            frames_since_reset: 0,
            first_image_ready: false,
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn roi(&self) -> Roi {
        self.roi
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn buffer(&self) -> &StatBuffer {
        &self.buffer
    }

    /// True once `min_init_frames` frames went through since the last reset.
    pub fn first_image_ready(&self) -> bool {
        self.first_image_ready
    }

    pub fn frames_since_reset(&self) -> u32 {
        self.frames_since_reset
    }

    /// Zero all statistics, stable values and the init counter.
    pub fn reset_buffers(&mut self) {
        self.buffer.reset();
        self.frames_since_reset = 0;
        self.first_image_ready = false;
        log::debug!("Frame filter buffers reset");
    }

    /// Adopt a new ROI, standardized and clamped to the frame. Resets the buffers.
    pub fn set_roi(&mut self, roi: Roi) -> Roi {
        self.roi = roi.standardized().clamped(self.width, self.height);
        self.reset_buffers();
        log::info!("Frame filter ROI set to {}", self.roi);
        self.roi
    }

    /// Swap in new tuning. Buffers are reallocated if the window size changed.
    pub fn reconfigure(&mut self, config: FilterConfig) {
        let config = config.validated();
        if config.averaging_slots != self.buffer.slots() {
            self.buffer = StatBuffer::new(self.width, self.height, config.averaging_slots);
        }
        self.config = config;
        self.reset_buffers();
        log::info!("Frame filter reconfigured");
    }

    /// Run one raw frame through clip, temporal, spatial and gradient passes.
    pub fn process_frame(
        &mut self,
        raw: &RawFrame,
        color: Option<ColorFrame>,
    ) -> Result<FilterOutput, SensorError> {
        if raw.width != self.width || raw.height != self.height || raw.data.len() != self.samples.len() {
            return Err(SensorError::SizeMismatch {
                expected: self.samples.len(),
                actual: raw.data.len(),
            });
        }

        let (near, far) = (self.config.near_clip, self.config.far_clip);
        for (sample, &depth) in self.samples.iter_mut().zip(&raw.data) {
            *sample = if depth == 0 || depth < near || depth > far {
                0.0
            } else {
                self.config.normalize(depth)
            };
        }

        temporal::apply(
            &self.config,
            &mut self.buffer,
            &self.roi,
            &self.samples,
            &mut self.temporal_out,
        );

        let mut filtered = FilteredFrame::new(self.width, self.height);
        filtered.frame_number = raw.frame_number;
        if self.config.spatial_filter {
            spatial::apply(self.width, &self.roi, &self.temporal_out, &mut filtered.data);
        } else {
            filtered.data.copy_from_slice(&self.temporal_out);
        }

        let gradient = GradientField::compute(
            self.width,
            &self.roi,
            &filtered.data,
            self.config.gradient_resolution,
            self.config.max_gradient,
        );

        self.frames_since_reset = self.frames_since_reset.saturating_add(1);
        if !self.first_image_ready && self.frames_since_reset >= self.config.min_init_frames {
            self.first_image_ready = true;
            log::info!("First filtered image ready after {} frames", self.frames_since_reset);
        }

        Ok(FilterOutput {
            filtered,
            color,
            gradient,
        })
    }
}
