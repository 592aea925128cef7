//! Candidate index over the secondary source.
//!
//! Matching scans every candidate, so the index is not used for pruning.
//! It groups candidates by normalized key (for collision accounting and
//! debugging) and fixes the iteration order that tie-breaks depend on:
//! insertion order of the secondary source.

use rustc_hash::FxHashMap;

use crate::config::CollisionPolicy;
use crate::models::{MatchCandidate, NormalizedKey, SecondaryRecord};
use crate::normalize::Normalizer;

/// Candidate slots in iteration order, plus slot lists per key.
#[derive(Clone, Debug, Default)]
pub struct CandidateIndex {
    candidates: Vec<MatchCandidate>,
    by_key: FxHashMap<NormalizedKey, Vec<usize>>,
    collisions: usize,
    source_len: usize,
}

impl CandidateIndex {
    pub fn build(
        records: &[SecondaryRecord],
        normalizer: &Normalizer,
        policy: CollisionPolicy,
    ) -> Self {
        let mut index = CandidateIndex {
            candidates: Vec::with_capacity(records.len()),
            by_key: FxHashMap::default(),
            collisions: 0,
            source_len: records.len(),
        };

        for (position, record) in records.iter().enumerate() {
            let candidate = MatchCandidate {
                position,
                key: normalizer.secondary_key(record),
                keywords: normalizer.keywords(&record.reason),
                url: record.url.clone(),
                announcement: record.announcement.clone(),
                images: record.images.clone(),
            };
            index.insert(candidate, policy);
        }

        if index.collisions > 0 {
            log::info!(
                "Candidate index: {} records share a key with an earlier record ({:?})",
                index.collisions,
                policy
            );
        }
        index
    }

    fn insert(&mut self, candidate: MatchCandidate, policy: CollisionPolicy) {
        match self.by_key.get_mut(&candidate.key) {
            None => {
                self.by_key
                    .insert(candidate.key.clone(), vec![self.candidates.len()]);
                self.candidates.push(candidate);
            }
            Some(slots) => {
                self.collisions += 1;
                log::debug!(
                    "Key collision at secondary record {}: '{}'",
                    candidate.position,
                    candidate.key
                );
                match policy {
                    CollisionPolicy::KeepAll => {
                        slots.push(self.candidates.len());
                        self.candidates.push(candidate);
                    }
                    CollisionPolicy::LastWins => {
                        // The key keeps its first slot; only the contents change.
                        let slot = slots[0];
                        self.candidates[slot] = candidate;
                    }
                }
            }
        }
    }

    /// Every candidate with its key, in iteration order.
    pub fn lookup_all(&self) -> impl Iterator<Item = (&NormalizedKey, &MatchCandidate)> + '_ {
        self.candidates.iter().map(|c| (&c.key, c))
    }

    pub fn candidates(&self) -> &[MatchCandidate] {
        &self.candidates
    }

    /// Candidates stored under `key`, in iteration order.
    pub fn get(&self, key: &NormalizedKey) -> Vec<&MatchCandidate> {
        self.by_key
            .get(key)
            .map(|slots| slots.iter().map(|&i| &self.candidates[i]).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn key_count(&self) -> usize {
        self.by_key.len()
    }

    /// Records that normalized to an already-present key
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Number of secondary records the index was built from
    pub fn source_len(&self) -> usize {
        self.source_len
    }
}
