//! Partitioned, append-only dataset store.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::jsonl::{append_record, read_records, rewrite_records};
use super::partition::{Partition, PartitionPaths};
use crate::error::StoreError;
use crate::sample::Sample;

/// JSONL-backed store for the pending pool and every partition.
///
/// Appends are plain appends: no existence checks happen at this layer.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    pending_path: PathBuf,
    partitions: PartitionPaths,
}

impl DatasetStore {
    pub fn new(pending_path: impl Into<PathBuf>, partitions: PartitionPaths) -> Self {
        Self {
            pending_path: pending_path.into(),
            partitions,
        }
    }

    /// Store with the pending file and every partition under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join("pending.jsonl"), PartitionPaths::under(dir))
    }

    pub fn pending_path(&self) -> &Path {
        &self.pending_path
    }

    pub fn partition_path(&self, partition: Partition) -> &Path {
        self.partitions.path(partition)
    }

    pub fn pending_exists(&self) -> bool {
        self.pending_path.exists()
    }

    /// Appends a sample to a partition.
    pub async fn append(&self, partition: Partition, sample: &Sample) -> Result<(), StoreError> {
        debug!(sample_id = %sample.short_id(), %partition, "Appending sample");
        append_record(self.partitions.path(partition), sample).await
    }

    /// Reads a partition; a partition never written reads as empty.
    pub async fn read(&self, partition: Partition) -> Result<Vec<Sample>, StoreError> {
        read_records(self.partitions.path(partition)).await
    }

    /// Atomically replaces a partition's contents.
    pub async fn rewrite(&self, partition: Partition, samples: &[Sample]) -> Result<(), StoreError> {
        rewrite_records(self.partitions.path(partition), samples).await
    }

    /// Reads the pending pool, assigning ids to records that lack one.
    ///
    /// Assigned ids are written back so later runs see the same ids.
    pub async fn read_pending(&self) -> Result<Vec<Sample>, StoreError> {
        let mut samples: Vec<Sample> = read_records(&self.pending_path).await?;
        let assigned = samples
            .iter_mut()
            .map(Sample::ensure_id)
            .filter(|assigned| *assigned)
            .count();
        if assigned > 0 {
            rewrite_records(&self.pending_path, &samples).await?;
            warn!(count = assigned, "Assigned ids to pending records without one");
        }
        Ok(samples)
    }

    pub async fn append_pending(&self, sample: &Sample) -> Result<(), StoreError> {
        append_record(&self.pending_path, sample).await
    }

    /// Ids that already have a final disposition.
    pub async fn terminal_ids(&self) -> Result<HashSet<String>, StoreError> {
        let mut ids = HashSet::new();
        for partition in Partition::TERMINAL {
            for sample in self.read(partition).await? {
                if !sample.id.is_empty() {
                    ids.insert(sample.id);
                }
            }
        }
        Ok(ids)
    }
}
