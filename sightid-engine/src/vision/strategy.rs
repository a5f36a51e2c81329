//! Descriptor strategy selection
//!
//! The two extractor/matcher families are incompatible: a shape signature
//! can only be scored against another shape signature, and their scores run
//! in opposite directions. [`DescriptorStrategy`] is chosen once from
//! configuration; [`DescriptorPipeline`] is the only place that branches on
//! it.

use super::keypoint::{ratio_test_matches, KeypointExtractor, KeypointSet};
use super::normalizer::ImageNormalizer;
use super::shape::{shape_distance, ShapeExtractor, ShapeSignature};
use super::{decode_photo, VisionError};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Active descriptor family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorStrategy {
    /// Edge map + Hu-moment distance
    Shape,
    /// Local keypoints + ratio-test match count
    Keypoint,
}

impl DescriptorStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptorStrategy::Shape => "shape",
            DescriptorStrategy::Keypoint => "keypoint",
        }
    }
}

impl fmt::Display for DescriptorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DescriptorStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shape" => Ok(DescriptorStrategy::Shape),
            "keypoint" => Ok(DescriptorStrategy::Keypoint),
            other => Err(format!("unknown descriptor strategy '{}'", other)),
        }
    }
}

/// Descriptor tagged with the family that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum Descriptor {
    Shape(ShapeSignature),
    Keypoint(KeypointSet),
}

impl Descriptor {
    pub fn strategy(&self) -> DescriptorStrategy {
        match self {
            Descriptor::Shape(_) => DescriptorStrategy::Shape,
            Descriptor::Keypoint(_) => DescriptorStrategy::Keypoint,
        }
    }

    pub fn to_json(&self) -> Result<String, VisionError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, VisionError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Similarity score; the variant carries the direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    /// Lower is more similar
    Distance(f64),
    /// Higher is more similar
    MatchCount(u32),
}

impl Score {
    /// Scalar value as stored alongside a sighting
    pub fn value(&self) -> f64 {
        match self {
            Score::Distance(d) => *d,
            Score::MatchCount(c) => f64::from(*c),
        }
    }

    /// Whether `self` is strictly more similar than `other`
    ///
    /// Scores of different kinds never compare as better.
    pub fn is_better_than(&self, other: &Score) -> bool {
        match (self, other) {
            (Score::Distance(a), Score::Distance(b)) => a < b,
            (Score::MatchCount(a), Score::MatchCount(b)) => a > b,
            _ => false,
        }
    }
}

/// Decision threshold separating "same individual" from "different"
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    /// Match when `distance <= max` (inclusive)
    MaxDistance(f64),
    /// Match when `count > min` (exclusive)
    MinMatches(u32),
}

impl Threshold {
    pub fn accepts(&self, score: &Score) -> bool {
        match (self, score) {
            (Threshold::MaxDistance(max), Score::Distance(d)) => d <= max,
            (Threshold::MinMatches(min), Score::MatchCount(c)) => c > min,
            _ => false,
        }
    }
}

/// Normalizer, active extractor and matching rules for one deployment
#[derive(Debug, Clone)]
pub struct DescriptorPipeline {
    strategy: DescriptorStrategy,
    normalizer: ImageNormalizer,
    shape: ShapeExtractor,
    keypoint: KeypointExtractor,
    ratio: f32,
    threshold: Threshold,
}

impl DescriptorPipeline {
    pub fn new(
        strategy: DescriptorStrategy,
        normalizer: ImageNormalizer,
        shape: ShapeExtractor,
        keypoint: KeypointExtractor,
        ratio: f32,
        threshold: Threshold,
    ) -> Self {
        Self {
            strategy,
            normalizer,
            shape,
            keypoint,
            ratio,
            threshold,
        }
    }

    /// Default shape pipeline: distance <= 0.1
    pub fn shape_default() -> Self {
        Self::new(
            DescriptorStrategy::Shape,
            ImageNormalizer::default(),
            ShapeExtractor::default(),
            KeypointExtractor::default(),
            super::keypoint::DEFAULT_RATIO,
            Threshold::MaxDistance(0.1),
        )
    }

    /// Default keypoint pipeline: more than 60 good matches
    pub fn keypoint_default() -> Self {
        Self::new(
            DescriptorStrategy::Keypoint,
            ImageNormalizer::default(),
            ShapeExtractor::default(),
            KeypointExtractor::default(),
            super::keypoint::DEFAULT_RATIO,
            Threshold::MinMatches(60),
        )
    }

    pub fn strategy(&self) -> DescriptorStrategy {
        self.strategy
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// Normalize then extract with the active strategy
    pub fn describe(&self, image: &RgbImage) -> Result<Descriptor, VisionError> {
        let normalized = self.normalizer.normalize(image);
        match self.strategy {
            DescriptorStrategy::Shape => Ok(Descriptor::Shape(self.shape.extract(&normalized)?)),
            DescriptorStrategy::Keypoint => {
                Ok(Descriptor::Keypoint(self.keypoint.extract(&normalized)))
            }
        }
    }

    /// Decode raw photo bytes and describe them
    pub fn describe_photo(&self, bytes: &[u8]) -> Result<Descriptor, VisionError> {
        let image = decode_photo(bytes)?;
        self.describe(&image)
    }

    /// Score `query` against a catalog `reference` of the same family
    pub fn score(&self, query: &Descriptor, reference: &Descriptor) -> Result<Score, VisionError> {
        match (query, reference) {
            (Descriptor::Shape(a), Descriptor::Shape(b)) => Ok(Score::Distance(shape_distance(a, b))),
            (Descriptor::Keypoint(a), Descriptor::Keypoint(b)) => {
                Ok(Score::MatchCount(ratio_test_matches(a, b, self.ratio)))
            }
            (a, b) => Err(VisionError::StrategyMismatch {
                left: a.strategy(),
                right: b.strategy(),
            }),
        }
    }
}
