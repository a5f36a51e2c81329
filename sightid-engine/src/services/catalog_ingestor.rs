//! Catalog ingestion
//!
//! Turns an identity verdict into rows: a new Individual when the sighting
//! is unknown, then the Sighting itself. Runs entirely inside the caller's
//! [`TransactionContext`]; the caller commits.

use crate::db::individuals::{self, NewIndividual};
use crate::db::sightings::{self, NewSighting};
use crate::models::SubmissionOutcome;
use crate::services::geocoder::Locality;
use crate::services::identity_resolver::IdentityVerdict;
use crate::utils::pool_monitor::TransactionContext;
use crate::vision::Descriptor;
use chrono::NaiveDate;
use sightid_common::Result;
use tracing::info;
use uuid::Uuid;

/// Everything about one sighting the ingest path writes
#[derive(Debug)]
pub struct IngestRequest<'a> {
    pub photo_body: &'a [u8],
    pub photo_head: &'a [u8],
    pub observed_on: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub name_hint: Option<&'a str>,
    /// Head-photo descriptor; becomes the reference of a new individual
    pub descriptor: &'a Descriptor,
    pub locality: &'a Locality,
}

pub struct CatalogIngestor {
    default_name_prefix: String,
}

impl CatalogIngestor {
    pub fn new(default_name_prefix: impl Into<String>) -> Self {
        Self {
            default_name_prefix: default_name_prefix.into(),
        }
    }

    /// `<prefix>-<yyyymmdd>-<8 hex>` for individuals submitted without a name
    pub fn generated_name(&self, observed_on: NaiveDate) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}",
            self.default_name_prefix,
            observed_on.format("%Y%m%d"),
            &suffix[..8]
        )
    }

    /// Write the verdict and the sighting; does not commit
    pub async fn ingest(
        &self,
        ctx: &mut TransactionContext,
        verdict: IdentityVerdict,
        request: &IngestRequest<'_>,
    ) -> Result<SubmissionOutcome> {
        let (individual_id, matched) = match verdict {
            IdentityVerdict::NewIdentity => {
                let name = match request.name_hint {
                    Some(hint) => hint.to_string(),
                    None => self.generated_name(request.observed_on),
                };

                let id = individuals::insert_individual(
                    ctx.conn(),
                    &NewIndividual {
                        name: &name,
                        reference_photo: request.photo_head,
                        descriptor: request.descriptor,
                        first_seen: request.observed_on,
                    },
                )
                .await?;

                info!(
                    request_id = %ctx.request_id(),
                    individual_id = id,
                    name = %name,
                    "New individual created"
                );
                (id, None)
            }
            IdentityVerdict::MatchedIdentity(candidate) => {
                // Read while the transaction is still open
                let name = individuals::individual_name(ctx.conn(), candidate.individual_id).await?;
                (candidate.individual_id, Some((name, candidate.score.value())))
            }
        };

        let sighting_id = sightings::insert_sighting(
            ctx.conn(),
            &NewSighting {
                individual_id,
                photo_body: request.photo_body,
                photo_head: request.photo_head,
                latitude: request.latitude,
                longitude: request.longitude,
                state: &request.locality.state,
                city: &request.locality.city,
                observed_on: request.observed_on,
                matched_existing: matched.is_some(),
                match_score: matched.as_ref().map(|(_, score)| *score),
            },
        )
        .await?;

        info!(
            request_id = %ctx.request_id(),
            individual_id,
            sighting_id,
            matched_existing = matched.is_some(),
            "Sighting recorded"
        );

        Ok(match matched {
            None => SubmissionOutcome::Created {
                individual_id,
                sighting_id,
            },
            Some((matched_name, score)) => SubmissionOutcome::Conflict {
                individual_id,
                matched_name,
                sighting_id,
                score,
            },
        })
    }
}
