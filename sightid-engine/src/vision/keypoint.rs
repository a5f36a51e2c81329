//! Multi-scale local keypoint descriptor and ratio-test scorer
//!
//! Photos are resampled onto a fixed ladder of level sizes (long side
//! `LADDER_TOP` divided by powers of `SCALE_STEP`). Two photos of the same
//! pattern at different resolutions therefore share pyramid levels, and a
//! pattern photographed from a different distance lines up with a
//! neighboring level of the other photo.
//!
//! On every level, FAST-9 corners are thinned by non-maximum suppression and
//! described by a 4×4 grid of 8-bin gradient orientation histograms over a
//! 16×16 patch of that level (128 values, L2-normalized). The keypoint
//! budget is split across levels by level area.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::corners::{corners_fast9, Corner};
use imageproc::definitions::Image;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Default FAST intensity threshold
pub const DEFAULT_FAST_THRESHOLD: u8 = 20;

/// Default cap on keypoints kept per photo (all levels together)
pub const DEFAULT_MAX_KEYPOINTS: usize = 500;

/// Default Lowe ratio for the nearest/second-nearest test
pub const DEFAULT_RATIO: f32 = 0.8;

/// Long side of the largest ladder level
const LADDER_TOP: f32 = 1024.0;
/// Size ratio between neighboring levels
const SCALE_STEP: f32 = 1.2;
const MAX_LEVELS: usize = 8;
/// Levels whose short side drops below this are not built
const MIN_LEVEL_SIDE: u32 = 32;
/// Corners closer than this (level pixels) to a stronger one are dropped
const SUPPRESSION_RADIUS: u32 = 3;

const PATCH_RADIUS: u32 = 8;
const CELLS: usize = 4;
const CELL_SIZE: usize = 4;
const BINS: usize = 8;
const DESCRIPTOR_LEN: usize = CELLS * CELLS * BINS;

type Gradient = Image<Luma<i16>>;

/// Histogram entries are capped at this value before renormalizing
const ENTRY_CAP: f32 = 0.2;

/// One local feature: photo location, pyramid scale and descriptor vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: u32,
    pub y: u32,
    /// Level size relative to the photo (1.0 = full resolution)
    pub scale: f32,
    pub descriptor: Vec<f32>,
}

/// All local features of one photo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeypointSet {
    pub keypoints: Vec<Keypoint>,
}

impl KeypointSet {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Size of one pyramid level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PyramidLevel {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

/// Ladder levels usable for a `width`×`height` photo, largest first
///
/// Levels larger than the photo are skipped so nothing is upsampled.
pub fn pyramid_levels(width: u32, height: u32) -> Vec<PyramidLevel> {
    let long_side = width.max(height);
    let mut levels = Vec::new();
    if long_side == 0 {
        return levels;
    }

    for step in 0.. {
        let side = (LADDER_TOP / SCALE_STEP.powi(step)).round() as u32;
        if side > long_side {
            continue;
        }

        let scale = side as f32 / long_side as f32;
        let level = PyramidLevel {
            width: ((width as f32 * scale).round() as u32).max(1),
            height: ((height as f32 * scale).round() as u32).max(1),
            scale,
        };
        if level.width.min(level.height) < MIN_LEVEL_SIDE {
            break;
        }

        levels.push(level);
        if levels.len() == MAX_LEVELS {
            break;
        }
    }

    levels
}

/// Keypoint descriptor extractor
#[derive(Debug, Clone, Copy)]
pub struct KeypointExtractor {
    fast_threshold: u8,
    max_keypoints: usize,
}

impl KeypointExtractor {
    pub fn new(fast_threshold: u8, max_keypoints: usize) -> Self {
        Self {
            fast_threshold,
            max_keypoints,
        }
    }

    /// Detect and describe keypoints of a normalized photo on every level
    pub fn extract(&self, image: &RgbImage) -> KeypointSet {
        let gray = imageops::grayscale(image);
        let levels = pyramid_levels(gray.width(), gray.height());
        let total_area: f32 = levels.iter().map(|l| (l.width * l.height) as f32).sum();

        let mut remaining = self.max_keypoints;
        let mut keypoints = Vec::new();

        for level in &levels {
            let share = (level.width * level.height) as f32 / total_area;
            let budget = ((self.max_keypoints as f32 * share).round() as usize).min(remaining);
            if budget == 0 {
                continue;
            }

            let found = if (level.width, level.height) == gray.dimensions() {
                self.extract_level(&gray, level, budget)
            } else {
                let resized = imageops::resize(&gray, level.width, level.height, FilterType::Triangle);
                self.extract_level(&resized, level, budget)
            };

            remaining -= found.len();
            keypoints.extend(found);
        }

        KeypointSet { keypoints }
    }

    fn extract_level(&self, image: &GrayImage, level: &PyramidLevel, budget: usize) -> Vec<Keypoint> {
        let (width, height) = image.dimensions();

        let mut corners: Vec<Corner> = corners_fast9(image, self.fast_threshold)
            .into_iter()
            .filter(|c| {
                c.x >= PATCH_RADIUS
                    && c.y >= PATCH_RADIUS
                    && c.x + PATCH_RADIUS <= width
                    && c.y + PATCH_RADIUS <= height
            })
            .collect();

        // Strongest first; position breaks ties so the order is reproducible
        corners.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.y.cmp(&b.y))
                .then(a.x.cmp(&b.x))
        });
        let corners = suppress_non_maxima(corners, width, height, budget);

        let gx = horizontal_sobel(image);
        let gy = vertical_sobel(image);

        corners
            .iter()
            .map(|c| Keypoint {
                x: (c.x as f32 / level.scale).round() as u32,
                y: (c.y as f32 / level.scale).round() as u32,
                scale: level.scale,
                descriptor: describe_patch(&gx, &gy, c.x, c.y),
            })
            .collect()
    }
}

impl Default for KeypointExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_FAST_THRESHOLD, DEFAULT_MAX_KEYPOINTS)
    }
}

/// Keep at most `budget` corners, none within `SUPPRESSION_RADIUS` of a
/// stronger kept one. `sorted` must be strongest first.
fn suppress_non_maxima(sorted: Vec<Corner>, width: u32, height: u32, budget: usize) -> Vec<Corner> {
    let mut taken = vec![false; (width * height) as usize];
    let mut kept = Vec::with_capacity(budget.min(sorted.len()));

    for corner in sorted {
        if kept.len() == budget {
            break;
        }
        if taken[(corner.y * width + corner.x) as usize] {
            continue;
        }

        let y_end = (corner.y + SUPPRESSION_RADIUS).min(height - 1);
        let x_end = (corner.x + SUPPRESSION_RADIUS).min(width - 1);
        for y in corner.y.saturating_sub(SUPPRESSION_RADIUS)..=y_end {
            for x in corner.x.saturating_sub(SUPPRESSION_RADIUS)..=x_end {
                taken[(y * width + x) as usize] = true;
            }
        }
        kept.push(corner);
    }

    kept
}

fn describe_patch(gx: &Gradient, gy: &Gradient, cx: u32, cy: u32) -> Vec<f32> {
    let mut hist = vec![0f32; DESCRIPTOR_LEN];
    let x0 = cx - PATCH_RADIUS;
    let y0 = cy - PATCH_RADIUS;
    let side = (PATCH_RADIUS * 2) as usize;

    for py in 0..side {
        for px in 0..side {
            let x = x0 + px as u32;
            let y = y0 + py as u32;
            let dx = f32::from(gx.get_pixel(x, y).0[0]);
            let dy = f32::from(gy.get_pixel(x, y).0[0]);
            let magnitude = (dx * dx + dy * dy).sqrt();
            if magnitude == 0.0 {
                continue;
            }

            let angle = dy.atan2(dx) + PI;
            let bin = ((angle / (2.0 * PI) * BINS as f32) as usize) % BINS;
            let cell = (py / CELL_SIZE) * CELLS + (px / CELL_SIZE);
            hist[cell * BINS + bin] += magnitude;
        }
    }

    normalize(&mut hist);
    for value in hist.iter_mut() {
        *value = value.min(ENTRY_CAP);
    }
    normalize(&mut hist);
    hist
}

fn normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Count ratio-test matches of `a` against `b`; higher is more similar
///
/// A descriptor in `a` matches when its nearest neighbor in `b` is closer
/// than `ratio` times the second nearest. Fewer than two descriptors in `b`
/// yields zero.
pub fn ratio_test_matches(a: &KeypointSet, b: &KeypointSet, ratio: f32) -> u32 {
    if b.len() < 2 {
        return 0;
    }

    let ratio_sq = ratio * ratio;
    let mut good = 0u32;

    for query in &a.keypoints {
        let mut best = f32::INFINITY;
        let mut second = f32::INFINITY;
        for candidate in &b.keypoints {
            let d = squared_distance(&query.descriptor, &candidate.descriptor);
            if d < best {
                second = best;
                best = d;
            } else if d < second {
                second = d;
            }
        }

        if best < ratio_sq * second {
            good += 1;
        }
    }

    good
}
