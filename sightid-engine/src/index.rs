//! Reference index over catalog descriptors
//!
//! The identity resolver never walks the catalog table itself; it asks a
//! [`ReferenceIndex`] for candidates. [`LinearIndex`] returns every entry,
//! which keeps resolution exact at O(catalog size). An approximate
//! nearest-neighbor index can implement the same trait.

use crate::db::individuals::CatalogReference;
use crate::vision::{Descriptor, DescriptorPipeline};
use tracing::{debug, warn};

/// One catalog individual and its reference descriptor
#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    pub individual_id: i64,
    pub descriptor: Descriptor,
}

/// Source of candidate references for a query descriptor
pub trait ReferenceIndex: Send + Sync {
    /// Entries worth scoring against `query`
    fn candidates(&self, query: &Descriptor) -> Vec<&ReferenceEntry>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exhaustive index: every entry is a candidate
#[derive(Debug, Clone, Default)]
pub struct LinearIndex {
    entries: Vec<ReferenceEntry>,
    missing_photos: Vec<i64>,
}

impl LinearIndex {
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        Self {
            entries,
            missing_photos: Vec::new(),
        }
    }

    /// Build from catalog rows for the active strategy
    ///
    /// A cached descriptor from another strategy (or one that no longer
    /// parses) is recomputed from the stored reference photo. Rows whose
    /// photo yields no descriptor are left out of the index. Rows that need
    /// a recompute but came without their photo are listed by
    /// [`LinearIndex::take_missing_photos`].
    pub fn from_catalog(references: Vec<CatalogReference>, pipeline: &DescriptorPipeline) -> Self {
        let active = pipeline.strategy();
        let mut index = Self::default();

        for reference in references {
            let cached = if reference.descriptor_strategy == active.as_str() {
                Descriptor::from_json(&reference.descriptor).ok()
            } else {
                None
            };

            let descriptor = match (cached, &reference.reference_photo) {
                (Some(descriptor), _) => descriptor,
                (None, None) => {
                    debug!(
                        individual_id = reference.individual_id,
                        "Cached descriptor unreadable; reference photo needed"
                    );
                    index.missing_photos.push(reference.individual_id);
                    continue;
                }
                (None, Some(photo)) => {
                    debug!(
                        individual_id = reference.individual_id,
                        cached_strategy = %reference.descriptor_strategy,
                        active_strategy = %active,
                        "Recomputing reference descriptor"
                    );
                    match pipeline.describe_photo(photo) {
                        Ok(descriptor) => descriptor,
                        Err(e) => {
                            warn!(
                                individual_id = reference.individual_id,
                                error = %e,
                                "Reference photo has no usable descriptor; skipping"
                            );
                            continue;
                        }
                    }
                }
            };

            index.entries.push(ReferenceEntry {
                individual_id: reference.individual_id,
                descriptor,
            });
        }

        index
    }

    /// Ids whose reference photo must be loaded to index them
    pub fn take_missing_photos(&mut self) -> Vec<i64> {
        std::mem::take(&mut self.missing_photos)
    }

    /// Merge entries built from another batch of catalog rows
    pub fn extend(&mut self, other: LinearIndex) {
        self.entries.extend(other.entries);
        self.missing_photos.extend(other.missing_photos);
    }
}

impl ReferenceIndex for LinearIndex {
    fn candidates(&self, _query: &Descriptor) -> Vec<&ReferenceEntry> {
        self.entries.iter().collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
