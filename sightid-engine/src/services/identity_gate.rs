//! Single-writer gate for identity creation
//!
//! Submissions whose coordinates fall in the same bucket take turns through
//! the catalog scan and the ingest transaction. Different buckets proceed in
//! parallel.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Grid cell of `bucket_degrees` × `bucket_degrees`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bucket {
    lat_cell: i64,
    lon_cell: i64,
}

/// Map of bucket → lock; locks are created on first use and kept
pub struct IdentityGate {
    bucket_degrees: f64,
    locks: Mutex<HashMap<Bucket, Arc<Mutex<()>>>>,
}

/// Held for the duration of one serialized submission
pub struct GatePermit {
    pub bucket: Bucket,
    _guard: OwnedMutexGuard<()>,
}

impl IdentityGate {
    /// `bucket_degrees <= 0` puts every coordinate in one global bucket
    pub fn new(bucket_degrees: f64) -> Self {
        Self {
            bucket_degrees,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn bucket_for(&self, latitude: f64, longitude: f64) -> Bucket {
        if self.bucket_degrees <= 0.0 {
            return Bucket { lat_cell: 0, lon_cell: 0 };
        }
        Bucket {
            lat_cell: (latitude / self.bucket_degrees).floor() as i64,
            lon_cell: (longitude / self.bucket_degrees).floor() as i64,
        }
    }

    /// Wait for exclusive access to the bucket containing the coordinates
    pub async fn acquire(&self, latitude: f64, longitude: f64) -> GatePermit {
        let bucket = self.bucket_for(latitude, longitude);
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(bucket).or_default())
        };

        tracing::debug!(?bucket, "Waiting for identity gate");
        let guard = lock.lock_owned().await;
        GatePermit { bucket, _guard: guard }
    }
}
