//! Per-pixel running statistics and averaging ring.
//!
//! All buffers are contiguous and indexed by `y * width + x`. The ring holds
//! `slots` samples per pixel, pixel-major; a slot value of `0.0` marks an
//! empty slot (no valid sample was stored there).

/// Running statistics over one pixel's averaging window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PixelStat {
    /// Valid samples in the window
    pub count: u32,
    /// Sum of samples
    pub sum: f64,
    /// Sum of squared samples
    pub sum_sq: f64,
}

impl PixelStat {
    pub fn mean(&self) -> Option<f32> {
        if self.count == 0 {
            return None;
        }
        Some((self.sum / self.count as f64) as f32)
    }

    pub fn variance(&self) -> Option<f32> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        // Rounding can push this slightly below zero
        Some((self.sum_sq / n - mean * mean).max(0.0) as f32)
    }

    /// A pixel is stable with enough samples and a small enough variance.
    pub fn is_stable(&self, min_num_samples: u32, max_variance: f32) -> bool {
        if self.count == 0 || self.count < min_num_samples {
            return false;
        }
        self.variance().is_some_and(|v| v <= max_variance)
    }

    fn add(&mut self, sample: f32) {
        let sample = sample as f64;
        self.count += 1;
        self.sum += sample;
        self.sum_sq += sample * sample;
    }

    fn remove(&mut self, sample: f32) {
        if self.count == 0 {
            return;
        }
        self.count -= 1;
        if self.count == 0 {
            *self = Self::default();
        } else {
            let sample = sample as f64;
            self.sum -= sample;
            self.sum_sq -= sample * sample;
        }
    }

    fn restart(&mut self, sample: f32) {
        let sample = sample as f64;
        self.count = 1;
        self.sum = sample;
        self.sum_sq = sample * sample;
    }
}

/// Arena of per-pixel statistics, last stable values and averaging slots.
#[derive(Debug, Clone)]
pub struct StatBuffer {
    width: u32,
    height: u32,
    slots: usize,
    slot_index: usize,
    stats: Vec<PixelStat>,
    valid: Vec<f32>,
    /// Whether `valid` holds an accepted stable mean rather than the initial
    /// zero or the instable sentinel
    held: Vec<bool>,
    ring: Vec<f32>,
}

impl StatBuffer {
    pub fn new(width: u32, height: u32, slots: usize) -> Self {
        let pixels = width as usize * height as usize;
        let slots = slots.max(1);
        Self {
            width,
            height,
            slots,
            slot_index: 0,
            stats: vec![PixelStat::default(); pixels],
            valid: vec![0.0; pixels],
            held: vec![false; pixels],
            ring: vec![0.0; pixels * slots],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn pixel_count(&self) -> usize {
        self.stats.len()
    }

    /// Zero every statistic, stable value and slot in place.
    pub fn reset(&mut self) {
        self.stats.fill(PixelStat::default());
        self.valid.fill(0.0);
        self.held.fill(false);
        self.ring.fill(0.0);
        self.slot_index = 0;
    }

    pub fn stat(&self, index: usize) -> PixelStat {
        self.stats[index]
    }

    pub fn valid_value(&self, index: usize) -> f32 {
        self.valid[index]
    }

    /// Accept a stable mean as the pixel's displayed value.
    pub fn set_valid_value(&mut self, index: usize, value: f32) {
        self.valid[index] = value;
        self.held[index] = true;
    }

    /// Replace the displayed value with the instable sentinel.
    pub fn mark_instable(&mut self, index: usize, sentinel: f32) {
        self.valid[index] = sentinel;
        self.held[index] = false;
    }

    pub fn holds_stable_value(&self, index: usize) -> bool {
        self.held[index]
    }

    /// Value a new sample is compared against for a big change: the last
    /// stable value, or the window mean before the pixel was ever stable.
    pub fn change_reference(&self, index: usize) -> Option<f32> {
        if self.held[index] {
            Some(self.valid[index])
        } else {
            self.stats[index].mean()
        }
    }

    /// Slot the current frame writes into.
    pub fn slot_index(&self) -> usize {
        self.slot_index
    }

    /// Move to the next slot once a frame has been fully accumulated.
    pub fn advance_slot(&mut self) {
        self.slot_index = (self.slot_index + 1) % self.slots;
    }

    /// Store `sample` (or an empty slot for `0.0`) in the current slot,
    /// evicting whatever the slot held from the window.
    pub fn replace_slot(&mut self, index: usize, sample: f32) {
        let slot = index * self.slots + self.slot_index;
        let old = self.ring[slot];
        if old > 0.0 {
            self.stats[index].remove(old);
        }
        self.ring[slot] = sample;
        if sample > 0.0 {
            self.stats[index].add(sample);
        }
    }

    /// Start a fresh window holding only `sample`.
    pub fn restart(&mut self, index: usize, sample: f32) {
        let start = index * self.slots;
        let ring = &mut self.ring[start..start + self.slots];
        ring.fill(0.0);
        ring[self.slot_index] = sample;
        self.stats[index].restart(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stat_is_never_stable() {
        let stat = PixelStat::default();
        assert!(stat.mean().is_none());
        assert!(!stat.is_stable(0, f32::MAX));
        assert!(!stat.is_stable(1, f32::MAX));
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let mut buffer = StatBuffer::new(1, 1, 3);
        for sample in [1.0, 2.0, 3.0, 4.0] {
            buffer.replace_slot(0, sample);
            buffer.advance_slot();
        }
        let stat = buffer.stat(0);
        assert_eq!(stat.count, 3);
        assert!((stat.sum - 9.0).abs() < 1e-6);
        assert!((stat.sum_sq - 29.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_sample_only_evicts() {
        let mut buffer = StatBuffer::new(1, 1, 2);
        buffer.replace_slot(0, 5.0);
        buffer.advance_slot();
        buffer.replace_slot(0, 0.0);
        buffer.advance_slot();
        assert_eq!(buffer.stat(0).count, 1);

        buffer.replace_slot(0, 0.0);
        assert_eq!(buffer.stat(0), PixelStat::default());
    }

    #[test]
    fn test_restart_clears_other_slots() {
        let mut buffer = StatBuffer::new(2, 1, 4);
        for _ in 0..3 {
            buffer.replace_slot(0, 1.0);
            buffer.replace_slot(1, 1.0);
            buffer.advance_slot();
        }
        buffer.restart(0, 8.0);
        buffer.advance_slot();
        assert_eq!(buffer.stat(0).count, 1);

        // Wrapping around must not evict samples from before the restart
        for _ in 0..3 {
            buffer.replace_slot(0, 8.0);
            buffer.advance_slot();
        }
        let stat = buffer.stat(0);
        assert_eq!(stat.count, 4);
        assert!((stat.mean().unwrap() - 8.0).abs() < 1e-6);

        // Neighbouring pixel untouched
        assert_eq!(buffer.stat(1).count, 3);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut buffer = StatBuffer::new(2, 2, 2);
        buffer.replace_slot(3, 0.5);
        buffer.set_valid_value(3, 0.5);
        buffer.advance_slot();
        buffer.reset();
        assert_eq!(buffer.stat(3), PixelStat::default());
        assert_eq!(buffer.valid_value(3), 0.0);
        assert_eq!(buffer.change_reference(3), None);
        assert_eq!(buffer.slot_index(), 0);
    }

    #[test]
    fn test_change_reference_prefers_stable_value() {
        let mut buffer = StatBuffer::new(1, 1, 4);
        assert_eq!(buffer.change_reference(0), None);

        buffer.replace_slot(0, 2.0);
        buffer.advance_slot();
        buffer.replace_slot(0, 4.0);
        assert_eq!(buffer.change_reference(0), Some(3.0));

        buffer.set_valid_value(0, 2.5);
        assert_eq!(buffer.change_reference(0), Some(2.5));

        buffer.mark_instable(0, -1.0);
        assert_eq!(buffer.valid_value(0), -1.0);
        assert_eq!(buffer.change_reference(0), Some(3.0));
    }
}
