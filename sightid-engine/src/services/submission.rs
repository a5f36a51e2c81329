//! SubmitSighting
//!
//! Validates a submission, settles its coordinates (photo EXIF first, then
//! the submitted values), describes the head photo, resolves the locality,
//! decides the identity and commits the sighting. In `serialized` mode the
//! identity decision and the ingest share one write transaction under the
//! identity gate; in `relaxed` mode the catalog is scanned in its own read
//! transaction first, so concurrent first sightings can both create an
//! individual.

use crate::config::{ConsistencyMode, EngineConfig};
use crate::db::individuals::{self, CatalogReference};
use crate::error::{SubmissionError, SubmissionResult};
use crate::index::LinearIndex;
use crate::models::{SightingSubmission, SubmissionOutcome};
use crate::services::catalog_ingestor::{CatalogIngestor, IngestRequest};
use crate::services::geocoder::{BigDataCloudClient, Locality, ReverseGeocoder};
use crate::services::identity_gate::IdentityGate;
use crate::services::identity_resolver::{IdentityResolver, IdentityVerdict};
use crate::services::photo_location::{self, CoordinateSource, Coordinates};
use crate::utils::{retry_on_lock, TransactionContext};
use crate::vision::{decode_photo, Descriptor, VisionError};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Submission fields that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubmission {
    pub observed_on: NaiveDate,
    pub name_hint: Option<String>,
    pub coordinates: Coordinates,
    pub coordinate_source: CoordinateSource,
}

/// Check everything that can be checked without decoding pixels
pub fn validate(submission: &SightingSubmission) -> SubmissionResult<ValidatedSubmission> {
    if submission.photo_body.is_empty() || submission.photo_head.is_empty() {
        return Err(SubmissionError::Validation(
            "Both body and head photos are required".to_string(),
        ));
    }

    let observed_on = parse_date(&submission.date)?;

    let submitted = match (submission.latitude, submission.longitude) {
        (Some(lat), Some(lon)) => {
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                return Err(SubmissionError::Validation(format!("Invalid latitude: {}", lat)));
            }
            if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                return Err(SubmissionError::Validation(format!("Invalid longitude: {}", lon)));
            }
            Some(Coordinates {
                latitude: lat,
                longitude: lon,
            })
        }
        (None, None) => None,
        _ => {
            return Err(SubmissionError::Validation(
                "Latitude and longitude must be given together".to_string(),
            ))
        }
    };

    let name_hint = match &submission.name_hint {
        None => None,
        Some(name) if name.trim().is_empty() => {
            return Err(SubmissionError::Validation("Name must not be blank".to_string()))
        }
        Some(name) => Some(name.trim().to_string()),
    };

    let (coordinates, coordinate_source) = photo_location::resolve_coordinates(
        &[submission.photo_body.as_slice(), submission.photo_head.as_slice()],
        submitted,
    )?;

    Ok(ValidatedSubmission {
        observed_on,
        name_hint,
        coordinates,
        coordinate_source,
    })
}

/// Strict `YYYY-MM-DD`
fn parse_date(date: &str) -> SubmissionResult<NaiveDate> {
    let bytes = date.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());

    if !well_formed {
        return Err(SubmissionError::Validation(format!("Invalid date: {}", date)));
    }

    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| SubmissionError::Validation(format!("Invalid date: {}", date)))
}

fn vision_to_submission(err: VisionError) -> SubmissionError {
    match err {
        VisionError::Decode(_) | VisionError::NoFeatures(_) => {
            SubmissionError::Validation(err.to_string())
        }
        other => SubmissionError::Internal(other.to_string()),
    }
}

/// Boundary operation wiring the resolver, ingestor, gate and geocoder
pub struct SubmissionService {
    pool: SqlitePool,
    resolver: Arc<IdentityResolver>,
    ingestor: CatalogIngestor,
    geocoder: Arc<dyn ReverseGeocoder>,
    gate: IdentityGate,
    consistency: ConsistencyMode,
    fallback_locality: String,
    max_lock_wait_ms: u64,
}

impl SubmissionService {
    pub fn new(pool: SqlitePool, config: &EngineConfig, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self {
            pool,
            resolver: Arc::new(IdentityResolver::new(config.pipeline())),
            ingestor: CatalogIngestor::new(config.default_name_prefix.clone()),
            geocoder,
            gate: IdentityGate::new(config.bucket_degrees),
            consistency: config.consistency,
            fallback_locality: config.fallback_locality.clone(),
            max_lock_wait_ms: config.max_lock_wait_ms,
        }
    }

    /// Service backed by the configured BigDataCloud endpoint
    pub fn from_config(pool: SqlitePool, config: &EngineConfig) -> sightid_common::Result<Self> {
        let geocoder = BigDataCloudClient::new(
            config.geocoder_url.clone(),
            Duration::from_secs(config.geocoder_timeout_secs),
        )
        .map_err(|e| sightid_common::Error::Config(format!("Geocoder client: {}", e)))?;

        Ok(Self::new(pool, config, Arc::new(geocoder)))
    }

    /// Submit one sighting
    pub async fn submit(&self, submission: SightingSubmission) -> SubmissionResult<SubmissionOutcome> {
        let request_id = Uuid::new_v4();
        let validated = validate(&submission)?;
        let Coordinates {
            latitude,
            longitude,
        } = validated.coordinates;

        debug!(
            request_id = %request_id,
            observed_on = %validated.observed_on,
            latitude,
            longitude,
            source = ?validated.coordinate_source,
            "Submission validated"
        );

        let (submission, descriptor) = self.describe(submission).await?;
        let locality = self.locality(request_id, latitude, longitude).await;

        let request = IngestRequest {
            photo_body: &submission.photo_body,
            photo_head: &submission.photo_head,
            observed_on: validated.observed_on,
            latitude,
            longitude,
            name_hint: validated.name_hint.as_deref(),
            descriptor: &descriptor,
            locality: &locality,
        };

        let outcome = match self.consistency {
            ConsistencyMode::Relaxed => self.submit_relaxed(request_id, &request).await?,
            ConsistencyMode::Serialized => self.submit_serialized(request_id, &request).await?,
        };

        info!(
            request_id = %request_id,
            individual_id = outcome.individual_id(),
            sighting_id = outcome.sighting_id(),
            status = outcome.status().as_u16(),
            "Submission committed"
        );
        Ok(outcome)
    }

    /// Decode both photos and describe the head photo on a blocking worker
    async fn describe(
        &self,
        submission: SightingSubmission,
    ) -> SubmissionResult<(SightingSubmission, Descriptor)> {
        let resolver = Arc::clone(&self.resolver);

        tokio::task::spawn_blocking(move || {
            decode_photo(&submission.photo_body).map_err(vision_to_submission)?;
            let head = decode_photo(&submission.photo_head).map_err(vision_to_submission)?;
            let descriptor = resolver.pipeline().describe(&head).map_err(vision_to_submission)?;
            Ok::<_, SubmissionError>((submission, descriptor))
        })
        .await
        .map_err(|e| SubmissionError::Internal(format!("Descriptor worker failed: {}", e)))?
    }

    /// Reverse geocode; failures fall back to the configured locality
    async fn locality(&self, request_id: Uuid, latitude: f64, longitude: f64) -> Locality {
        match self.geocoder.lookup(latitude, longitude).await {
            Ok(locality) => locality,
            Err(e) => {
                warn!(
                    request_id = %request_id,
                    error = %e,
                    fallback = %self.fallback_locality,
                    "Reverse geocoding failed; storing fallback locality"
                );
                Locality::fallback(&self.fallback_locality)
            }
        }
    }

    /// Load the catalog on `ctx` and resolve `descriptor` against it
    async fn resolve_in(
        &self,
        ctx: &mut TransactionContext,
        descriptor: &Descriptor,
    ) -> SubmissionResult<IdentityVerdict> {
        let active = self.resolver.pipeline().strategy();
        let references = individuals::load_catalog_references(ctx.conn(), active).await?;
        let mut index = self.build_index(references).await?;

        let missing = index.take_missing_photos();
        if !missing.is_empty() {
            let mut reloaded = Vec::with_capacity(missing.len());
            for individual_id in missing {
                reloaded.push(individuals::load_reference(ctx.conn(), individual_id).await?);
            }
            index.extend(self.build_index(reloaded).await?);
        }

        let resolver = Arc::clone(&self.resolver);
        let query = descriptor.clone();

        tokio::task::spawn_blocking(move || resolver.resolve(&query, &index))
            .await
            .map_err(|e| SubmissionError::Internal(format!("Resolver worker failed: {}", e)))?
            .map_err(vision_to_submission)
    }

    async fn build_index(&self, references: Vec<CatalogReference>) -> SubmissionResult<LinearIndex> {
        let resolver = Arc::clone(&self.resolver);

        tokio::task::spawn_blocking(move || LinearIndex::from_catalog(references, resolver.pipeline()))
            .await
            .map_err(|e| SubmissionError::Internal(format!("Index worker failed: {}", e)))
    }

    async fn submit_relaxed(
        &self,
        request_id: Uuid,
        request: &IngestRequest<'_>,
    ) -> SubmissionResult<SubmissionOutcome> {
        let verdict = {
            let mut ctx = TransactionContext::begin(&self.pool, "submission::scan", request_id).await?;
            let verdict = self.resolve_in(&mut ctx, request.descriptor).await?;
            ctx.commit().await?;
            verdict
        };

        // Another submission may commit between the scan above and the
        // insert below.
        retry_on_lock("submission::ingest", self.max_lock_wait_ms, move || async move {
            let mut ctx = TransactionContext::begin(&self.pool, "submission::ingest", request_id).await?;
            let outcome = self.ingestor.ingest(&mut ctx, verdict, request).await?;
            ctx.commit().await?;
            Ok::<_, SubmissionError>(outcome)
        })
        .await
    }

    async fn submit_serialized(
        &self,
        request_id: Uuid,
        request: &IngestRequest<'_>,
    ) -> SubmissionResult<SubmissionOutcome> {
        let permit = self.gate.acquire(request.latitude, request.longitude).await;
        debug!(request_id = %request_id, bucket = ?permit.bucket, "Identity gate acquired");

        let caller = "submission::resolve_and_ingest";
        let outcome = retry_on_lock(caller, self.max_lock_wait_ms, move || async move {
            let mut ctx = TransactionContext::begin(&self.pool, caller, request_id).await?;
            let verdict = self.resolve_in(&mut ctx, request.descriptor).await?;
            let outcome = self.ingestor.ingest(&mut ctx, verdict, request).await?;
            ctx.commit().await?;
            Ok::<_, SubmissionError>(outcome)
        })
        .await;

        drop(permit);
        outcome
    }
}
