//! Engine services

pub mod catalog_ingestor;
pub mod geocoder;
pub mod identity_gate;
pub mod identity_resolver;
pub mod photo_location;
pub mod submission;

pub use catalog_ingestor::{CatalogIngestor, IngestRequest};
pub use geocoder::{BigDataCloudClient, GeocodeError, Locality, ReverseGeocoder};
pub use identity_gate::IdentityGate;
pub use identity_resolver::{IdentityResolver, IdentityVerdict, MatchedCandidate};
pub use photo_location::{CoordinateSource, Coordinates};
pub use submission::SubmissionService;
