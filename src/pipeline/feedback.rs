//! Feedback loop: turns failed samples back into pending work.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::metrics::MetricsCollector;
use crate::sample::Sample;
use crate::storage::{DatasetStore, Partition};

use super::config::PipelineConfig;

/// Counters for one feedback pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedbackReport {
    /// Records read from the source partitions.
    pub scanned: usize,
    /// New pending samples written.
    pub requeued: usize,
    /// Records missing a task description or context.
    pub skipped_incomplete: usize,
    /// Records whose task is already waiting in the pending pool.
    pub skipped_outstanding: usize,
    /// Records whose task already has an accepted sample.
    pub skipped_accepted: usize,
    /// Records whose sample was requeued by an earlier pass.
    pub skipped_requeued: usize,
}

/// Rehydrates failure partitions into the pending pool.
pub struct FeedbackLoop {
    store: DatasetStore,
    sources: Vec<Partition>,
    metrics: MetricsCollector,
}

impl FeedbackLoop {
    pub fn new(store: DatasetStore, sources: Vec<Partition>) -> Self {
        Self {
            store,
            sources,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.store(), config.feedback_sources.clone())
    }

    /// Scans every source partition once.
    ///
    /// A record is skipped when its task already has an accepted sample, when
    /// its sample id was requeued before (by this pass or an earlier one), or
    /// when its task is outstanding: a pending record for it has no final
    /// disposition yet. New records get a fresh id, an empty output and no
    /// diagnostics.
    pub async fn run(&self) -> Result<FeedbackReport, StoreError> {
        let pending = self.store.read_pending().await?;
        let terminal = self.store.terminal_ids().await?;
        let accepted: HashSet<(String, String)> = self
            .store
            .read(Partition::Accepted)
            .await?
            .iter()
            .map(Sample::task_key)
            .collect();
        let mut requeued: HashSet<String> = pending
            .iter()
            .filter_map(|s| s.requeued_from.clone())
            .collect();
        let mut outstanding: HashSet<(String, String)> = pending
            .iter()
            .filter(|s| !terminal.contains(&s.id))
            .map(Sample::task_key)
            .collect();

        let mut report = FeedbackReport::default();
        for source in &self.sources {
            let records = self.store.read(*source).await?;
            debug!(partition = %source, records = records.len(), "Scanning feedback source");

            for record in records {
                report.scanned += 1;
                if record.task_description.trim().is_empty() || record.context.trim().is_empty() {
                    report.skipped_incomplete += 1;
                    continue;
                }
                let key = record.task_key();
                if accepted.contains(&key) {
                    report.skipped_accepted += 1;
                    continue;
                }
                if requeued.contains(&record.id) {
                    report.skipped_requeued += 1;
                    continue;
                }
                if !outstanding.insert(key) {
                    report.skipped_outstanding += 1;
                    continue;
                }

                let fresh = record.to_pending();
                self.store.append_pending(&fresh).await?;
                requeued.insert(record.id.clone());
                debug!(from = %record.short_id(), to = %fresh.short_id(), "Requeued task");
                report.requeued += 1;
            }
        }

        self.metrics.record_requeued(report.requeued);
        info!(
            scanned = report.scanned,
            requeued = report.requeued,
            skipped_incomplete = report.skipped_incomplete,
            skipped_outstanding = report.skipped_outstanding,
            skipped_accepted = report.skipped_accepted,
            skipped_requeued = report.skipped_requeued,
            "Feedback pass complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn failed(task: &str, context: &str) -> Sample {
        let mut sample = Sample::new(task, context).with_error("Traceback");
        sample.candidate_output = "import x".to_string();
        sample.attempt_count = 3;
        sample
    }

    #[tokio::test]
    async fn test_requeues_failures_once() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::in_dir(dir.path());
        store.append(Partition::ExecutionError, &failed("a", "ctx")).await.unwrap();
        store.append(Partition::ExecutionError, &failed("a", "ctx")).await.unwrap();
        store.append(Partition::PermanentlyFailed, &failed("a", "ctx")).await.unwrap();
        store.append(Partition::PermanentlyFailed, &failed("b", "ctx")).await.unwrap();

        let feedback = FeedbackLoop::new(
            store.clone(),
            vec![Partition::ExecutionError, Partition::PermanentlyFailed],
        );
        let report = feedback.run().await.unwrap();
        assert_eq!(report.scanned, 4);
        assert_eq!(report.requeued, 2);
        assert_eq!(report.skipped_outstanding, 2);

        let pending = store.read_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|s| s.candidate_output.is_empty()));
        assert!(pending.iter().all(|s| s.error.is_none() && s.attempt_count == 0));

        // Everything just queued is outstanding now.
        let again = feedback.run().await.unwrap();
        assert_eq!(again.requeued, 0);
    }

    #[tokio::test]
    async fn test_skips_incomplete_records() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::in_dir(dir.path());
        store.append(Partition::ExecutionError, &failed("a", "")).await.unwrap();
        store.append(Partition::ExecutionError, &failed(" ", "ctx")).await.unwrap();

        let report = FeedbackLoop::new(store.clone(), vec![Partition::ExecutionError])
            .run()
            .await
            .unwrap();
        assert_eq!(report.skipped_incomplete, 2);
        assert_eq!(report.requeued, 0);
        assert!(!store.pending_exists());
    }

    #[tokio::test]
    async fn test_terminal_pending_records_are_not_outstanding() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::in_dir(dir.path());

        let original = Sample::new("a", "ctx");
        store.append_pending(&original).await.unwrap();
        let mut exhausted = failed("a", "ctx");
        exhausted.id = original.id.clone();
        store.append(Partition::PermanentlyFailed, &exhausted).await.unwrap();

        let report = FeedbackLoop::new(store.clone(), vec![Partition::PermanentlyFailed])
            .run()
            .await
            .unwrap();
        assert_eq!(report.requeued, 1);

        let pending = store.read_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_ne!(pending[1].id, original.id);
    }

    #[tokio::test]
    async fn test_open_pending_task_blocks_requeue() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::in_dir(dir.path());
        store.append_pending(&Sample::new("a", "ctx")).await.unwrap();
        store.append(Partition::ExecutionError, &failed("a", "ctx")).await.unwrap();

        let report = FeedbackLoop::new(store, vec![Partition::ExecutionError])
            .run()
            .await
            .unwrap();
        assert_eq!(report.requeued, 0);
        assert_eq!(report.skipped_outstanding, 1);
    }

    #[tokio::test]
    async fn test_accepted_task_is_not_requeued() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::in_dir(dir.path());

        let original = Sample::new("a", "ctx");
        store.append_pending(&original).await.unwrap();
        let mut attempt = failed("a", "ctx");
        attempt.id = original.id.clone();
        attempt.attempt_count = 1;
        store.append(Partition::ExecutionError, &attempt).await.unwrap();
        let mut accepted = original.clone();
        accepted.candidate_output = "import requests".to_string();
        accepted.attempt_count = 2;
        store.append(Partition::Accepted, &accepted).await.unwrap();

        let report = FeedbackLoop::new(store.clone(), vec![Partition::ExecutionError])
            .run()
            .await
            .unwrap();
        assert_eq!(report.requeued, 0);
        assert_eq!(report.skipped_accepted, 1);
        assert_eq!(store.read_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_sample_is_requeued_at_most_once() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::in_dir(dir.path());

        let original = Sample::new("a", "ctx");
        store.append_pending(&original).await.unwrap();
        for _ in 0..3 {
            let mut attempt = failed("a", "ctx");
            attempt.id = original.id.clone();
            store.append(Partition::ExecutionError, &attempt).await.unwrap();
        }
        let mut exhausted = failed("a", "ctx");
        exhausted.id = original.id.clone();
        store.append(Partition::PermanentlyFailed, &exhausted).await.unwrap();

        let feedback = FeedbackLoop::new(
            store.clone(),
            vec![Partition::ExecutionError, Partition::PermanentlyFailed],
        );
        let first = feedback.run().await.unwrap();
        assert_eq!(first.requeued, 1);
        assert_eq!(first.skipped_requeued, 3);

        // The requeued record fails too; only its own failure is requeued.
        let pending = store.read_pending().await.unwrap();
        assert_eq!(pending[1].requeued_from.as_deref(), Some(original.id.as_str()));
        let mut second_failure = failed("a", "ctx");
        second_failure.id = pending[1].id.clone();
        store.append(Partition::PermanentlyFailed, &second_failure).await.unwrap();

        let second = feedback.run().await.unwrap();
        assert_eq!(second.requeued, 1);
        assert_eq!(second.skipped_requeued, 4);

        let third = feedback.run().await.unwrap();
        assert_eq!(third.requeued, 0);
        assert_eq!(store.read_pending().await.unwrap().len(), 3);
    }
}
