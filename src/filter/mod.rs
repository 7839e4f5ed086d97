//! Depth frame filtering
//!
//! Turns raw sensor frames into a stable elevation map:
//! - Near/far clipping of raw samples
//! - Per-pixel temporal averaging with stability detection and hysteresis
//! - Optional 3x3 spatial smoothing inside the ROI
//! - A coarse gradient field over the ROI

mod frame;
mod gradient;
mod pipeline;
mod spatial;
mod stats;
mod temporal;

pub use frame::FilteredFrame;
pub use gradient::GradientField;
pub use pipeline::{FilterOutput, FrameFilterPipeline};
pub use stats::{PixelStat, StatBuffer};

use serde::{Deserialize, Serialize};

/// Filter tuning. Depth thresholds are in normalized units (raw / `depth_norm`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Number of slots in each pixel's averaging window
    pub averaging_slots: usize,
    /// Minimum number of samples before a pixel can be stable
    pub min_num_samples: u32,
    /// Maximum variance of a stable pixel
    pub max_variance: f32,
    /// Minimum change before a stable value is updated
    pub hysteresis: f32,
    /// Deviation from the running mean that restarts the window
    pub big_change: f32,
    /// Keep the last stable value while a pixel is unstable
    pub retain_valids: bool,
    /// Output for unstable pixels when `retain_valids` is off
    pub instable_value: f32,
    /// Enable the 3x3 spatial smoothing pass
    pub spatial_filter: bool,
    /// Gradient cell size in pixels
    pub gradient_resolution: u32,
    /// Clamp for gradient magnitudes
    pub max_gradient: f32,
    /// Raw samples below this are dropped
    pub near_clip: u16,
    /// Raw samples above this are dropped
    pub far_clip: u16,
    /// Frames to process before the first image counts as ready
    pub min_init_frames: u32,
    /// Raw units per normalized unit
    pub depth_norm: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            averaging_slots: 30,
            min_num_samples: 10,
            max_variance: 1.0e-6,
            hysteresis: 2.5e-4,
            big_change: 0.005,
            retain_valids: true,
            instable_value: 0.0,
            spatial_filter: false,
            gradient_resolution: 20,
            max_gradient: 0.1,
            near_clip: 500,
            far_clip: 1500,
            min_init_frames: 30,
            depth_norm: 2000.0,
        }
    }
}

impl FilterConfig {
    /// Copy with out-of-range values pulled back into something usable.
    pub fn validated(&self) -> Self {
        let mut config = self.clone();
        config.averaging_slots = config.averaging_slots.max(1);
        config.min_num_samples = config
            .min_num_samples
            .clamp(1, config.averaging_slots as u32);
        config.max_variance = config.max_variance.max(0.0);
        config.hysteresis = config.hysteresis.max(0.0);
        config.big_change = config.big_change.max(0.0);
        config.gradient_resolution = config.gradient_resolution.max(1);
        config.max_gradient = config.max_gradient.max(0.0);
        if config.near_clip >= config.far_clip {
            log::warn!(
                "near_clip {} >= far_clip {}, clip range reset to defaults",
                config.near_clip,
                config.far_clip
            );
            let defaults = Self::default();
            config.near_clip = defaults.near_clip;
            config.far_clip = defaults.far_clip;
        }
        if config.depth_norm.is_nan() || config.depth_norm <= 0.0 {
            config.depth_norm = Self::default().depth_norm;
        }
        config
    }

    /// Normalize a raw sample.
    #[inline]
    pub fn normalize(&self, raw: u16) -> f32 {
        raw as f32 / self.depth_norm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = FilterConfig::default();
        assert_eq!(config.validated(), config);
    }

    #[test]
    fn test_validated_clamps() {
        let config = FilterConfig {
            averaging_slots: 0,
            min_num_samples: 50,
            gradient_resolution: 0,
            near_clip: 2000,
            far_clip: 1000,
            depth_norm: 0.0,
            ..Default::default()
        }
        .validated();

        assert_eq!(config.averaging_slots, 1);
        assert_eq!(config.min_num_samples, 1);
        assert_eq!(config.gradient_resolution, 1);
        assert!(config.near_clip < config.far_clip);
        assert!((config.depth_norm - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize() {
        let config = FilterConfig::default();
        assert!((config.normalize(1000) - 0.5).abs() < 1e-6);
    }
}
