//! Automatic brightness/contrast normalization
//!
//! Estimates a linear gain/offset from the grayscale histogram, clipping a
//! small percentile of extreme values, and applies it to every channel so
//! photos taken under different lighting yield comparable descriptors.

use image::{imageops, RgbImage};

/// Default share of the histogram (percent) clipped across both tails
pub const DEFAULT_CLIP_PERCENT: f64 = 1.0;

/// Linear intensity mapping `out = |alpha * in + beta|`, saturated to u8
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainOffset {
    pub alpha: f64,
    pub beta: f64,
}

impl GainOffset {
    pub const IDENTITY: GainOffset = GainOffset { alpha: 1.0, beta: 0.0 };

    fn apply(&self, value: u8) -> u8 {
        let scaled = (self.alpha * f64::from(value) + self.beta).abs().round();
        scaled.min(255.0) as u8
    }
}

/// Brightness/contrast normalizer
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    clip_percent: f64,
}

impl ImageNormalizer {
    pub fn new(clip_percent: f64) -> Self {
        Self {
            clip_percent: clip_percent.clamp(0.0, 100.0),
        }
    }

    /// Estimate gain/offset from the image's grayscale histogram
    ///
    /// Returns the identity mapping for flat images (no usable range).
    pub fn estimate(&self, image: &RgbImage) -> GainOffset {
        let gray = imageops::grayscale(image);

        let mut hist = [0u64; 256];
        for pixel in gray.pixels() {
            hist[pixel.0[0] as usize] += 1;
        }

        let mut accumulator = [0f64; 256];
        let mut running = 0u64;
        for (slot, count) in accumulator.iter_mut().zip(hist.iter()) {
            running += count;
            *slot = running as f64;
        }

        let total = accumulator[255];
        if total == 0.0 {
            return GainOffset::IDENTITY;
        }
        let clip = self.clip_percent * (total / 100.0) / 2.0;

        let mut minimum_gray = 0usize;
        while minimum_gray < 255 && accumulator[minimum_gray] < clip {
            minimum_gray += 1;
        }

        let mut maximum_gray = 255usize;
        while maximum_gray > 0 && accumulator[maximum_gray] >= total - clip {
            maximum_gray -= 1;
        }

        if maximum_gray <= minimum_gray {
            return GainOffset::IDENTITY;
        }

        let alpha = 255.0 / (maximum_gray - minimum_gray) as f64;
        let beta = -(minimum_gray as f64) * alpha;
        GainOffset { alpha, beta }
    }

    /// Normalize an image; output has identical dimensions
    pub fn normalize(&self, image: &RgbImage) -> RgbImage {
        let mapping = self.estimate(image);
        if mapping == GainOffset::IDENTITY {
            return image.clone();
        }

        let lut: Vec<u8> = (0..=255u8).map(|v| mapping.apply(v)).collect();
        let mut out = image.clone();
        for pixel in out.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                *channel = lut[*channel as usize];
            }
        }

        tracing::trace!(alpha = mapping.alpha, beta = mapping.beta, "Normalized photo");
        out
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_CLIP_PERCENT)
    }
}
