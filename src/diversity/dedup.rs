//! Exact-duplicate detection over (task, context, output) triples.
//!
//! Keys are SHA-256 digests of the three fields joined by a unit separator
//! (0x1f), so `("ab", "c")` and `("a", "bc")` never collide the way plain
//! concatenation would.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::sample::Sample;

const FIELD_SEPARATOR: [u8; 1] = [0x1f];

/// Composite key identifying a (task, context, output) triple.
pub fn sample_key(task_description: &str, context: &str, output: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(task_description.as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(context.as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(output.as_bytes());
    hex::encode(hasher.finalize())
}

fn key_of(sample: &Sample) -> String {
    sample_key(
        &sample.task_description,
        &sample.context,
        &sample.candidate_output,
    )
}

/// Set of keys already seen; only ever grows.
#[derive(Debug, Clone, Default)]
pub struct SeenKeyIndex {
    keys: HashSet<String>,
}

impl SeenKeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from existing records.
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> Self {
        let mut index = Self::new();
        for sample in samples {
            index.insert(sample);
        }
        index
    }

    pub fn contains(&self, sample: &Sample) -> bool {
        self.keys.contains(&key_of(sample))
    }

    /// Checks a key produced by [`sample_key`].
    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Records the sample's key. Returns `false` if it was already present.
    pub fn insert(&mut self, sample: &Sample) -> bool {
        self.keys.insert(key_of(sample))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Result of a deduplication pass.
#[derive(Debug, Clone)]
pub struct DeduplicationResult {
    /// First occurrences, in input order.
    pub unique: Vec<Sample>,

    /// Number of later occurrences dropped.
    pub duplicate_count: usize,

    /// Number of samples before deduplication.
    pub total_before: usize,
}

impl DeduplicationResult {
    /// Returns the deduplication ratio (removed / total).
    pub fn dedup_ratio(&self) -> f64 {
        if self.total_before == 0 {
            return 0.0;
        }
        self.duplicate_count as f64 / self.total_before as f64
    }
}

/// Order-preserving exact deduplicator.
///
/// Holds no state between calls: every pass starts from an empty index.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    /// Keeps the first sample for each key and drops the rest.
    pub fn dedupe(&self, samples: Vec<Sample>) -> DeduplicationResult {
        let total_before = samples.len();
        let mut index = SeenKeyIndex::new();
        let unique: Vec<Sample> = samples
            .into_iter()
            .filter(|sample| index.insert(sample))
            .collect();

        DeduplicationResult {
            duplicate_count: total_before - unique.len(),
            unique,
            total_before,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, task: &str, context: &str, output: &str) -> Sample {
        let mut s = Sample::new(task, context);
        s.id = id.to_string();
        s.candidate_output = output.to_string();
        s
    }

    #[test]
    fn test_keeps_first_occurrence_in_order() {
        let result = Deduplicator::new().dedupe(vec![
            sample("1", "t", "c", "a"),
            sample("2", "t", "c", "b"),
            sample("3", "t", "c", "a"),
            sample("4", "u", "c", "a"),
        ]);

        let ids: Vec<&str> = result.unique.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
        assert_eq!(result.duplicate_count, 1);
        assert_eq!(result.total_before, 4);
        assert_eq!(result.dedup_ratio(), 0.25);
    }

    #[test]
    fn test_id_is_not_part_of_the_key() {
        let result = Deduplicator::new().dedupe(vec![
            sample("a", "t", "c", "o"),
            sample("b", "t", "c", "o"),
        ]);
        assert_eq!(result.unique.len(), 1);
        assert_eq!(result.unique[0].id, "a");
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let dedup = Deduplicator::new();
        let first = dedup.dedupe(vec![
            sample("1", "t", "c", "x"),
            sample("2", "t", "c", "x"),
            sample("3", "t", "d", "x"),
        ]);
        let second = dedup.dedupe(first.unique.clone());
        assert_eq!(second.duplicate_count, 0);
        assert_eq!(second.unique, first.unique);
    }

    #[test]
    fn test_field_boundaries_matter() {
        assert_ne!(sample_key("ab", "c", ""), sample_key("a", "bc", ""));
        assert_eq!(sample_key("a", "b", "c").len(), 64);
    }

    #[test]
    fn test_seen_index_grows() {
        let accepted = vec![sample("1", "t", "c", "x")];
        let mut index = SeenKeyIndex::from_samples(&accepted);
        assert_eq!(index.len(), 1);

        let candidate = sample("2", "t", "c", "x");
        assert!(index.contains(&candidate));
        assert!(!index.insert(&candidate));

        let fresh = sample("3", "t", "c", "y");
        assert!(!index.contains(&fresh));
        assert!(index.insert(&fresh));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let result = Deduplicator::new().dedupe(Vec::new());
        assert!(result.unique.is_empty());
        assert_eq!(result.dedup_ratio(), 0.0);
    }
}
