//! Engine configuration
//!
//! Resolved from the `[engine]` table of the TOML config, then environment
//! overrides. Every field has a default, so an absent table still yields a
//! working engine.

use crate::vision::keypoint::{DEFAULT_FAST_THRESHOLD, DEFAULT_MAX_KEYPOINTS, DEFAULT_RATIO};
use crate::vision::normalizer::DEFAULT_CLIP_PERCENT;
use crate::vision::shape::{DEFAULT_BINARY_CUTOFF, DEFAULT_BLUR_KERNEL};
use crate::vision::{
    DescriptorPipeline, DescriptorStrategy, ImageNormalizer, KeypointExtractor, ShapeExtractor,
    Threshold,
};
use serde::{Deserialize, Serialize};
use sightid_common::config::TomlConfig;
use sightid_common::{Error, Result};
use tracing::info;

/// Environment override for the descriptor strategy
pub const STRATEGY_ENV: &str = "SIGHTID_STRATEGY";

/// Environment override for the reverse geocoding endpoint
pub const GEOCODER_URL_ENV: &str = "SIGHTID_GEOCODER_URL";

/// Default reverse geocoding endpoint
pub const DEFAULT_GEOCODER_URL: &str = "https://api.bigdatacloud.net/data/reverse-geocode-client";

/// Locality value stored when reverse geocoding fails
pub const DEFAULT_FALLBACK_LOCALITY: &str = "indefinido";

/// How identity creation behaves under concurrent submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyMode {
    /// Catalog scan and insert run in separate transactions. Two concurrent
    /// first sightings of one individual may both create an Individual.
    Relaxed,
    /// Scan and insert run under a per-bucket single-writer lock inside one
    /// write transaction.
    Serialized,
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strategy: DescriptorStrategy,
    /// Shape matches when distance <= this value
    pub shape_max_distance: f64,
    /// Keypoint matches when good-match count > this value
    pub keypoint_min_matches: u32,
    /// Lowe ratio for the keypoint scorer (0.7 to 0.8)
    pub ratio: f32,
    pub max_keypoints: usize,
    pub fast_threshold: u8,
    pub blur_kernel: u32,
    pub binary_cutoff: u8,
    /// Histogram share (percent) clipped by the normalizer
    pub clip_percent: f64,
    pub consistency: ConsistencyMode,
    /// Edge length of the identity gate bucket in degrees; 0 means one bucket
    pub bucket_degrees: f64,
    /// How long a submission retries on SQLite lock contention
    pub max_lock_wait_ms: u64,
    pub geocoder_url: String,
    pub geocoder_timeout_secs: u64,
    pub fallback_locality: String,
    /// Prefix of generated names for individuals submitted without a name
    pub default_name_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: DescriptorStrategy::Shape,
            shape_max_distance: 0.1,
            keypoint_min_matches: 60,
            ratio: DEFAULT_RATIO,
            max_keypoints: DEFAULT_MAX_KEYPOINTS,
            fast_threshold: DEFAULT_FAST_THRESHOLD,
            blur_kernel: DEFAULT_BLUR_KERNEL,
            binary_cutoff: DEFAULT_BINARY_CUTOFF,
            clip_percent: DEFAULT_CLIP_PERCENT,
            consistency: ConsistencyMode::Serialized,
            bucket_degrees: 1.0,
            max_lock_wait_ms: 5000,
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            geocoder_timeout_secs: 10,
            fallback_locality: DEFAULT_FALLBACK_LOCALITY.to_string(),
            default_name_prefix: "individual".to_string(),
        }
    }
}

impl EngineConfig {
    /// Resolve from the TOML `[engine]` table plus environment overrides
    ///
    /// **Priority:** ENV → TOML → defaults
    pub fn resolve(toml_config: &TomlConfig) -> Result<Self> {
        let mut config: EngineConfig = toml::Value::Table(toml_config.engine.clone())
            .try_into()
            .map_err(|e| Error::Config(format!("Invalid [engine] section: {}", e)))?;

        if let Ok(strategy) = std::env::var(STRATEGY_ENV) {
            config.strategy = strategy
                .parse()
                .map_err(|e| Error::Config(format!("{}: {}", STRATEGY_ENV, e)))?;
            info!(strategy = %config.strategy, "Descriptor strategy overridden by environment");
        }

        if let Ok(url) = std::env::var(GEOCODER_URL_ENV) {
            if !url.trim().is_empty() {
                config.geocoder_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.ratio) || self.ratio == 0.0 {
            return Err(Error::Config(format!("ratio must be in (0, 1], got {}", self.ratio)));
        }
        if !self.shape_max_distance.is_finite() || self.shape_max_distance < 0.0 {
            return Err(Error::Config(format!(
                "shape_max_distance must be a non-negative number, got {}",
                self.shape_max_distance
            )));
        }
        if self.blur_kernel < 3 || self.blur_kernel % 2 == 0 {
            return Err(Error::Config(format!(
                "blur_kernel must be odd and >= 3, got {}",
                self.blur_kernel
            )));
        }
        if !(0.0..50.0).contains(&self.clip_percent) {
            return Err(Error::Config(format!(
                "clip_percent must be in [0, 50), got {}",
                self.clip_percent
            )));
        }
        if !self.bucket_degrees.is_finite() || self.bucket_degrees < 0.0 {
            return Err(Error::Config(format!(
                "bucket_degrees must be >= 0, got {}",
                self.bucket_degrees
            )));
        }
        if self.fallback_locality.trim().is_empty() {
            return Err(Error::Config("fallback_locality must not be empty".to_string()));
        }
        Ok(())
    }

    /// Decision threshold for the configured strategy
    pub fn threshold(&self) -> Threshold {
        match self.strategy {
            DescriptorStrategy::Shape => Threshold::MaxDistance(self.shape_max_distance),
            DescriptorStrategy::Keypoint => Threshold::MinMatches(self.keypoint_min_matches),
        }
    }

    /// Descriptor pipeline for the configured strategy
    pub fn pipeline(&self) -> DescriptorPipeline {
        DescriptorPipeline::new(
            self.strategy,
            ImageNormalizer::new(self.clip_percent),
            ShapeExtractor::new(self.blur_kernel, self.binary_cutoff),
            KeypointExtractor::new(self.fast_threshold, self.max_keypoints),
            self.ratio,
            self.threshold(),
        )
    }
}
