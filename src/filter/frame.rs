use image::GrayImage;

/// Filtered depth frame in normalized units. `0.0` means "no stable value".
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
    /// Sensor frame this was filtered from
    pub frame_number: u64,
}

impl FilteredFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize],
            frame_number: 0,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }

    /// Depth at `(x, y)` if the pixel holds a stable value.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<f32> {
        self.get(x, y).filter(|d| *d > 0.0)
    }

    /// 8-bit image with each value scaled by 255 and clamped.
    pub fn to_gray8(&self) -> GrayImage {
        let pixels = self
            .data
            .iter()
            .map(|v| (v * 255.0).clamp(0.0, 255.0) as u8)
            .collect();
        GrayImage::from_raw(self.width, self.height, pixels)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }
}
