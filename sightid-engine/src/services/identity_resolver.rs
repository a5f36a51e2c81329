//! Identity resolution
//!
//! Scores a query descriptor against every candidate the reference index
//! offers and decides between "new individual" and "matches individual X".

use crate::index::ReferenceIndex;
use crate::vision::{Descriptor, DescriptorPipeline, Score, VisionError};
use tracing::debug;

/// Winning catalog candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedCandidate {
    pub individual_id: i64,
    pub score: Score,
}

/// Identity decision for one submission
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdentityVerdict {
    /// No candidate crossed the threshold
    NewIdentity,
    /// Best qualifying candidate
    MatchedIdentity(MatchedCandidate),
}

/// Applies the pipeline's scorer and threshold to index candidates
pub struct IdentityResolver {
    pipeline: DescriptorPipeline,
}

impl IdentityResolver {
    pub fn new(pipeline: DescriptorPipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &DescriptorPipeline {
        &self.pipeline
    }

    /// Resolve `query` against `index`
    ///
    /// Best means lowest distance or highest match count; equal scores go to
    /// the lowest individual id regardless of candidate order.
    pub fn resolve(
        &self,
        query: &Descriptor,
        index: &dyn ReferenceIndex,
    ) -> Result<IdentityVerdict, VisionError> {
        let threshold = self.pipeline.threshold();
        let mut best: Option<MatchedCandidate> = None;
        let mut scored = 0usize;

        for entry in index.candidates(query) {
            let score = self.pipeline.score(query, &entry.descriptor)?;
            scored += 1;

            if !threshold.accepts(&score) {
                continue;
            }

            let replace = match &best {
                None => true,
                Some(current) => {
                    score.is_better_than(&current.score)
                        || (!current.score.is_better_than(&score)
                            && entry.individual_id < current.individual_id)
                }
            };

            if replace {
                best = Some(MatchedCandidate {
                    individual_id: entry.individual_id,
                    score,
                });
            }
        }

        debug!(
            candidates = scored,
            matched = ?best.map(|b| b.individual_id),
            "Identity resolved"
        );

        Ok(match best {
            Some(candidate) => IdentityVerdict::MatchedIdentity(candidate),
            None => IdentityVerdict::NewIdentity,
        })
    }
}
