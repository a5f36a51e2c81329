//! Shape/edge descriptor and the Hu-moment distance scorer
//!
//! Grayscale → Gaussian blur → binarization at a fixed cutoff → Canny with
//! bounds derived from the median intensity. The resulting edge map is
//! reduced to its seven Hu moment invariants.
//!
//! `imageproc::edges::canny` smooths its input with its own σ = 1.4 Gaussian
//! before taking gradients, so edges of the binarized image come out one
//! blur softer than an unsmoothed Canny would produce. Thresholds are
//! applied to that smoothed gradient.

use super::VisionError;
use image::{imageops, GrayImage, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};

/// Default blur kernel edge length (pixels)
pub const DEFAULT_BLUR_KERNEL: u32 = 11;

/// Default binarization cutoff; pixels strictly above it become white
pub const DEFAULT_BINARY_CUTOFF: u8 = 150;

/// Smallest gradient magnitude accepted as an edge
const MIN_GRADIENT: f32 = 1.0;

/// Hu values at or below this magnitude carry no usable log and are skipped
const HU_EPSILON: f64 = 1e-5;

/// Shape signature: Hu moment invariants of the edge map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeSignature {
    pub hu: [f64; 7],
    pub edge_pixels: u64,
}

/// Shape/edge descriptor extractor
#[derive(Debug, Clone, Copy)]
pub struct ShapeExtractor {
    blur_sigma: f32,
    binary_cutoff: u8,
}

impl ShapeExtractor {
    /// `blur_kernel` is the Gaussian kernel edge length; the sigma follows
    /// the usual kernel-size rule (11 → 2.0).
    pub fn new(blur_kernel: u32, binary_cutoff: u8) -> Self {
        Self {
            blur_sigma: sigma_for_kernel(blur_kernel),
            binary_cutoff,
        }
    }

    /// Edge map of a normalized photo
    pub fn edge_map(&self, image: &RgbImage) -> GrayImage {
        let gray = imageops::grayscale(image);
        let mut binary = gaussian_blur_f32(&gray, self.blur_sigma);
        for pixel in binary.pixels_mut() {
            pixel.0[0] = if pixel.0[0] > self.binary_cutoff { 255 } else { 0 };
        }

        // imageproc's hysteresis is inclusive, so a zero bound would mark
        // every pixel; keep at least one gray level of gradient.
        let (lower, upper) = canny_bounds(median_intensity(&binary));
        canny(&binary, lower.max(MIN_GRADIENT), upper.max(MIN_GRADIENT))
    }

    /// Extract the shape signature of a normalized photo
    pub fn extract(&self, image: &RgbImage) -> Result<ShapeSignature, VisionError> {
        let edges = self.edge_map(image);
        let edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count() as u64;
        if edge_pixels == 0 {
            return Err(VisionError::NoFeatures("no detectable shape".to_string()));
        }

        Ok(ShapeSignature {
            hu: hu_moments(&edges),
            edge_pixels,
        })
    }
}

impl Default for ShapeExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_BLUR_KERNEL, DEFAULT_BINARY_CUTOFF)
    }
}

/// Sigma for a Gaussian kernel of the given edge length
fn sigma_for_kernel(kernel: u32) -> f32 {
    let k = kernel.max(3) as f32;
    0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
}

/// Median pixel intensity (mean of the two middle values for even counts)
pub fn median_intensity(image: &GrayImage) -> f64 {
    let mut hist = [0u64; 256];
    for pixel in image.pixels() {
        hist[pixel.0[0] as usize] += 1;
    }

    let total: u64 = hist.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let nth = |rank: u64| -> usize {
        let mut seen = 0u64;
        for (value, count) in hist.iter().enumerate() {
            seen += count;
            if seen > rank {
                return value;
            }
        }
        255
    };

    if total % 2 == 1 {
        nth(total / 2) as f64
    } else {
        (nth(total / 2 - 1) + nth(total / 2)) as f64 / 2.0
    }
}

/// Canny hysteresis bounds: 0.7×median and 1.3×median, clamped and truncated
pub fn canny_bounds(median: f64) -> (f32, f32) {
    let lower = (0.7 * median).max(0.0).trunc();
    let upper = (1.3 * median).min(255.0).trunc();
    (lower as f32, upper as f32)
}

/// Hu moment invariants of a grayscale raster, weighted by intensity
pub fn hu_moments(image: &GrayImage) -> [f64; 7] {
    let mut m00 = 0.0;
    let mut m10 = 0.0;
    let mut m01 = 0.0;
    for (x, y, pixel) in image.enumerate_pixels() {
        let v = f64::from(pixel.0[0]);
        if v == 0.0 {
            continue;
        }
        m00 += v;
        m10 += v * f64::from(x);
        m01 += v * f64::from(y);
    }

    if m00 == 0.0 {
        return [0.0; 7];
    }

    let cx = m10 / m00;
    let cy = m01 / m00;

    let (mut mu20, mut mu11, mut mu02) = (0.0, 0.0, 0.0);
    let (mut mu30, mut mu21, mut mu12, mut mu03) = (0.0, 0.0, 0.0, 0.0);
    for (x, y, pixel) in image.enumerate_pixels() {
        let v = f64::from(pixel.0[0]);
        if v == 0.0 {
            continue;
        }
        let dx = f64::from(x) - cx;
        let dy = f64::from(y) - cy;
        mu20 += v * dx * dx;
        mu11 += v * dx * dy;
        mu02 += v * dy * dy;
        mu30 += v * dx * dx * dx;
        mu21 += v * dx * dx * dy;
        mu12 += v * dx * dy * dy;
        mu03 += v * dy * dy * dy;
    }

    // nu_pq = mu_pq / m00^(1 + (p+q)/2)
    let s2 = m00 * m00;
    let s3 = s2 * m00.sqrt();
    let (n20, n11, n02) = (mu20 / s2, mu11 / s2, mu02 / s2);
    let (n30, n21, n12, n03) = (mu30 / s3, mu21 / s3, mu12 / s3, mu03 / s3);

    let t0 = n30 + n12;
    let t1 = n21 + n03;
    let q0 = t0 * t0;
    let q1 = t1 * t1;
    let p0 = n30 - 3.0 * n12;
    let p1 = 3.0 * n21 - n03;

    [
        n20 + n02,
        (n20 - n02) * (n20 - n02) + 4.0 * n11 * n11,
        p0 * p0 + p1 * p1,
        q0 + q1,
        p0 * t0 * (q0 - 3.0 * q1) + p1 * t1 * (3.0 * q0 - q1),
        (n20 - n02) * (q0 - q1) + 4.0 * n11 * t0 * t1,
        p1 * t0 * (q0 - 3.0 * q1) - p0 * t1 * (3.0 * q0 - q1),
    ]
}

/// Hu-moment I2 distance; lower is more similar, 0 means identical statistics
pub fn shape_distance(a: &ShapeSignature, b: &ShapeSignature) -> f64 {
    a.hu.iter()
        .zip(b.hu.iter())
        .filter(|(ha, hb)| ha.abs() > HU_EPSILON && hb.abs() > HU_EPSILON)
        .map(|(ha, hb)| {
            let la = ha.signum() * ha.abs().log10();
            let lb = hb.signum() * hb.abs().log10();
            (la - lb).abs()
        })
        .sum()
}
