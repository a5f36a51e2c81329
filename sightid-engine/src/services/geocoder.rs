//! Reverse geocoding client
//!
//! Resolves sighting coordinates to state and city names. The shipped
//! client queries BigDataCloud's `reverse-geocode-client` endpoint, which
//! needs no API key.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("sightid/", env!("CARGO_PKG_VERSION"));

/// Administrative level of the state entry
const STATE_ADMIN_LEVEL: u32 = 4;

/// Administrative level of the city entry
const CITY_ADMIN_LEVEL: u32 = 8;

/// Reverse geocoding errors
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}")]
    Api(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Response has no {0}")]
    MissingLocality(&'static str),
}

/// Locality names for a coordinate pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locality {
    pub state: String,
    pub city: String,
}

impl Locality {
    /// Locality stored when geocoding failed
    pub fn fallback(value: &str) -> Self {
        Self {
            state: value.to_string(),
            city: value.to_string(),
        }
    }
}

/// Coordinates → locality names
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<Locality, GeocodeError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReverseGeocodeResponse {
    principal_subdivision: Option<String>,
    city: Option<String>,
    locality: Option<String>,
    locality_info: Option<LocalityInfo>,
}

#[derive(Debug, Deserialize)]
struct LocalityInfo {
    #[serde(default)]
    administrative: Vec<AdministrativeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdministrativeEntry {
    name: Option<String>,
    admin_level: Option<u32>,
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ReverseGeocodeResponse {
    fn admin_name(&self, level: u32) -> Option<String> {
        self.locality_info.as_ref().and_then(|info| {
            info.administrative
                .iter()
                .filter(|entry| entry.admin_level == Some(level))
                .find_map(|entry| non_blank(entry.name.as_ref()))
        })
    }

    fn into_locality(self) -> Result<Locality, GeocodeError> {
        let state = self
            .admin_name(STATE_ADMIN_LEVEL)
            .or_else(|| non_blank(self.principal_subdivision.as_ref()))
            .ok_or(GeocodeError::MissingLocality("state"))?;

        let city = self
            .admin_name(CITY_ADMIN_LEVEL)
            .or_else(|| non_blank(self.city.as_ref()))
            .or_else(|| non_blank(self.locality.as_ref()))
            .ok_or(GeocodeError::MissingLocality("city"))?;

        Ok(Locality { state, city })
    }
}

/// Extract state and city from a reverse geocoding response body
pub fn parse_locality(body: &str) -> Result<Locality, GeocodeError> {
    let response: ReverseGeocodeResponse =
        serde_json::from_str(body).map_err(|e| GeocodeError::Parse(e.to_string()))?;
    response.into_locality()
}

/// BigDataCloud reverse geocoding client
pub struct BigDataCloudClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl BigDataCloudClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GeocodeError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GeocodeError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for BigDataCloudClient {
    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<Locality, GeocodeError> {
        tracing::debug!(latitude, longitude, url = %self.base_url, "Querying reverse geocoder");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("latitude", latitude), ("longitude", longitude)])
            .send()
            .await
            .map_err(|e| GeocodeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Api(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GeocodeError::Network(e.to_string()))?;

        let locality = parse_locality(&body)?;
        tracing::debug!(state = %locality.state, city = %locality.city, "Reverse geocoded");
        Ok(locality)
    }
}
