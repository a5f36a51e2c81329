//! Photo descriptors
//!
//! Decoding, normalization, descriptor extraction and scoring. Everything in
//! this module is pure CPU work with no I/O; callers run it on a blocking
//! worker.

pub mod keypoint;
pub mod normalizer;
pub mod shape;
pub mod strategy;

#[cfg(test)]
pub(crate) mod test_images;

pub use keypoint::{Keypoint, KeypointExtractor, KeypointSet};
pub use normalizer::{GainOffset, ImageNormalizer};
pub use shape::{ShapeExtractor, ShapeSignature};
pub use strategy::{Descriptor, DescriptorPipeline, DescriptorStrategy, Score, Threshold};

use image::RgbImage;
use thiserror::Error;

/// Descriptor pipeline errors
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Photo could not be decoded: {0}")]
    Decode(String),

    #[error("Photo has no detectable features: {0}")]
    NoFeatures(String),

    #[error("Descriptor strategies differ: {left} vs {right}")]
    StrategyMismatch {
        left: DescriptorStrategy,
        right: DescriptorStrategy,
    },

    #[error("Descriptor serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Decode raw photo bytes (any format the `image` crate recognizes) to RGB
pub fn decode_photo(bytes: &[u8]) -> Result<RgbImage, VisionError> {
    if bytes.is_empty() {
        return Err(VisionError::Decode("empty payload".to_string()));
    }

    let image = image::load_from_memory(bytes).map_err(|e| VisionError::Decode(e.to_string()))?;
    Ok(image.to_rgb8())
}
