//! Retry controller and batch driver.
//!
//! Each sample moves through
//! `pending → generating → executing → scoring → validating → deduping` and
//! ends in `accepted`, `rejected` (format gate) or `permanently_failed`. A
//! failed retryable gate sends it back to `generating` until the attempt
//! counter reaches the retry ceiling. Retries are a bounded loop, never
//! recursion.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::diversity::{sample_key, SeenKeyIndex};
use crate::error::StoreError;
use crate::generator::{sanitize, Generator};
use crate::metrics::MetricsCollector;
use crate::quality::QualityScorer;
use crate::runner::CodeExecutor;
use crate::sample::{Sample, SampleState};
use crate::storage::{DatasetStore, Partition};
use crate::validation::{check_format, SemanticValidator};

use super::config::{ConfigError, PipelineConfig};
use super::outcome::{Rejection, SampleOutcome};

/// Errors that abort a whole command rather than a single sample.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dataset storage error.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// A built-in pattern failed to compile.
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Aggregate counters for one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Records read from the pending pool.
    pub pending: u64,
    /// Pending records skipped because they already have a final disposition.
    pub skipped: u64,
    /// Samples pushed through the state machine.
    pub processed: u64,
    /// Generation attempts consumed across all samples.
    pub generated: u64,
    pub accepted: u64,
    pub permanently_failed: u64,
    pub non_program_output: u64,
    pub too_short: u64,
    /// Last rejection of every sample that was not accepted, by kind.
    pub rejected_by_kind: BTreeMap<String, u64>,
}

impl PipelineStats {
    /// Creates new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the final disposition of a sample.
    pub fn record(&mut self, outcome: &SampleOutcome) {
        self.processed += 1;
        self.generated += u64::from(outcome.sample.attempt_count);
        match outcome.partition {
            Partition::Accepted => self.accepted += 1,
            Partition::NonProgramOutput => self.non_program_output += 1,
            Partition::TooShort => self.too_short += 1,
            _ => self.permanently_failed += 1,
        }
        if let Some(rejection) = &outcome.rejection {
            *self
                .rejected_by_kind
                .entry(rejection.kind().to_string())
                .or_insert(0) += 1;
        }
    }

    /// Fraction of processed samples that were accepted.
    pub fn acceptance_rate(&self) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        self.accepted as f64 / self.processed as f64
    }
}

/// Result of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// False when the pending file did not exist; nothing was processed.
    pub pending_found: bool,
    pub stats: PipelineStats,
}

/// Drives samples through the gates with a bounded number of attempts.
pub struct RetryController {
    config: PipelineConfig,
    generator: Arc<dyn Generator>,
    executor: Arc<dyn CodeExecutor>,
    scorer: QualityScorer,
    validator: SemanticValidator,
    store: DatasetStore,
    seen: SeenKeyIndex,
    metrics: MetricsCollector,
}

impl RetryController {
    /// Creates a controller; the configuration is validated first.
    pub fn new(
        config: PipelineConfig,
        generator: Arc<dyn Generator>,
        executor: Arc<dyn CodeExecutor>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let validator = SemanticValidator::new(config.rule_profile)?;
        let store = config.store();

        Ok(Self {
            config,
            generator,
            executor,
            scorer: QualityScorer::new()?,
            validator,
            store,
            seen: SeenKeyIndex::new(),
            metrics: MetricsCollector::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Rebuilds the seen-key index from the accepted partition.
    pub async fn load_seen_keys(&mut self) -> Result<usize, PipelineError> {
        let accepted = self.store.read(Partition::Accepted).await?;
        self.seen = SeenKeyIndex::from_samples(&accepted);
        debug!(keys = self.seen.len(), "Loaded seen-key index");
        Ok(self.seen.len())
    }

    /// Pushes one sample to a final disposition and stores it.
    ///
    /// Gate failures never surface as `Err`; only storage failures do.
    pub async fn process_sample(&mut self, sample: Sample) -> Result<SampleOutcome, PipelineError> {
        let mut sample = sample;
        sample.ensure_id();
        sample.attempt_count = 0;
        sample.clear_diagnostics();

        let ceiling = self.config.retry_ceiling;
        info!(sample_id = %sample.short_id(), state = %SampleState::Pending, "Sample queued");

        let mut last_rejection = None;
        while sample.attempt_count < ceiling {
            sample.attempt_count += 1;
            sample.clear_diagnostics();

            let (output, result) = self.attempt(&sample).await;
            sample.candidate_output = output;

            let rejection = match result {
                Ok(()) => {
                    self.metrics.record_attempt("accepted");
                    return self.accept(sample).await;
                }
                Err(rejection) => rejection,
            };
            self.metrics.record_attempt(rejection.kind());

            if !rejection.is_retryable() {
                let partition = rejection.partition();
                let stored = rejection.annotate(sample);
                self.store.append(partition, &stored).await?;
                info!(
                    sample_id = %stored.short_id(),
                    state = %SampleState::Rejected,
                    %partition,
                    reason = %rejection,
                    "Sample rejected without retry"
                );
                let outcome = SampleOutcome {
                    sample: stored,
                    partition,
                    rejection: Some(rejection),
                };
                self.metrics.record_sample(outcome.label());
                return Ok(outcome);
            }

            warn!(
                sample_id = %sample.short_id(),
                attempt = sample.attempt_count,
                ceiling,
                kind = rejection.kind(),
                reason = %rejection,
                "Attempt failed"
            );
            if self.config.record_attempt_failures {
                let record = rejection.annotate(sample.clone());
                self.store.append(rejection.partition(), &record).await?;
            }
            last_rejection = Some(rejection);
        }

        let rejection = match last_rejection {
            Some(rejection) => rejection,
            None => Rejection::Generation("retry ceiling reached before any attempt".to_string()),
        };
        let stored = rejection.annotate(sample);
        self.store.append(Partition::PermanentlyFailed, &stored).await?;
        info!(
            sample_id = %stored.short_id(),
            state = %SampleState::PermanentlyFailed,
            attempts = stored.attempt_count,
            reason = %rejection,
            "Retry ceiling exhausted"
        );
        let outcome = SampleOutcome {
            sample: stored,
            partition: Partition::PermanentlyFailed,
            rejection: Some(rejection),
        };
        self.metrics.record_sample(outcome.label());
        Ok(outcome)
    }

    async fn accept(&mut self, sample: Sample) -> Result<SampleOutcome, PipelineError> {
        self.store.append(Partition::Accepted, &sample).await?;
        self.seen.insert(&sample);
        info!(
            sample_id = %sample.short_id(),
            state = %SampleState::Accepted,
            attempts = sample.attempt_count,
            "Sample accepted"
        );
        let outcome = SampleOutcome {
            sample,
            partition: Partition::Accepted,
            rejection: None,
        };
        self.metrics.record_sample(outcome.label());
        Ok(outcome)
    }

    /// Runs one attempt through every gate in order.
    ///
    /// Returns the candidate text (possibly empty) alongside the verdict.
    async fn attempt(&self, sample: &Sample) -> (String, Result<(), Rejection>) {
        let id = sample.short_id();
        let attempt = sample.attempt_count;

        info!(sample_id = %id, attempt, state = %SampleState::Generating, "Generating candidate");
        let raw = match self
            .generator
            .generate(&sample.task_description, &sample.context)
            .await
        {
            Ok(raw) => raw,
            Err(e) => return (String::new(), Err(Rejection::Generation(e.to_string()))),
        };
        let output = if self.config.sanitize {
            sanitize(&raw)
        } else {
            raw.trim().to_string()
        };

        if output.is_empty() {
            let reason = "empty output after sanitization".to_string();
            return (output, Err(Rejection::Generation(reason)));
        }
        if let Err(rejection) = check_format(&output) {
            return (output, Err(Rejection::Format(rejection)));
        }

        info!(sample_id = %id, attempt, state = %SampleState::Executing, "Executing candidate");
        let execution = self.executor.execute(&output).await;
        self.metrics.record_execution(execution.duration.as_secs_f64());
        if !execution.success {
            let diagnostic = execution.diagnostic();
            let diagnostic = if diagnostic.is_empty() {
                "execution failed without output".to_string()
            } else {
                diagnostic
            };
            return (output, Err(Rejection::Execution(diagnostic)));
        }

        info!(sample_id = %id, attempt, state = %SampleState::Scoring, "Scoring candidate");
        let score = self.scorer.score(&output);
        if let Some(issue) = self.config.quality.evaluate(&score) {
            return (output, Err(Rejection::Quality(issue)));
        }

        info!(sample_id = %id, attempt, state = %SampleState::Validating, "Validating candidate");
        if let Err(rejection) =
            self.validator
                .validate(&sample.task_description, &sample.context, &output)
        {
            return (output, Err(Rejection::Semantic(rejection)));
        }

        info!(sample_id = %id, attempt, state = %SampleState::Deduping, "Checking novelty");
        let key = sample_key(&sample.task_description, &sample.context, &output);
        if self.seen.contains_key(&key) {
            return (output, Err(Rejection::Duplicate));
        }

        (output, Ok(()))
    }

    /// Processes the pending pool sequentially.
    ///
    /// A missing pending file is logged and reported, not an error. Samples
    /// whose id already has a final disposition are skipped.
    pub async fn run_batch(&mut self) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        let mut stats = PipelineStats::new();

        if !self.store.pending_exists() {
            warn!(
                path = %self.store.pending_path().display(),
                "Pending file not found; nothing to process"
            );
            return Ok(RunReport {
                started_at,
                finished_at: Utc::now(),
                pending_found: false,
                stats,
            });
        }

        let pending = self.store.read_pending().await?;
        let mut done: HashSet<String> = self.store.terminal_ids().await?;
        self.load_seen_keys().await?;
        stats.pending = pending.len() as u64;

        info!(
            pending = pending.len(),
            already_processed = done.len(),
            ceiling = self.config.retry_ceiling,
            "Starting batch"
        );

        let delay = self.config.batch_delay();
        let mut first = true;
        for sample in pending {
            if done.contains(&sample.id) {
                debug!(sample_id = %sample.short_id(), "Already processed, skipping");
                stats.skipped += 1;
                continue;
            }
            if !first && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            first = false;

            let outcome = self.process_sample(sample).await?;
            done.insert(outcome.sample.id.clone());
            stats.record(&outcome);
        }

        info!(
            processed = stats.processed,
            generated = stats.generated,
            accepted = stats.accepted,
            permanently_failed = stats.permanently_failed,
            non_program_output = stats.non_program_output,
            too_short = stats.too_short,
            skipped = stats.skipped,
            "Run complete"
        );

        Ok(RunReport {
            started_at,
            finished_at: Utc::now(),
            pending_found: true,
            stats,
        })
    }
}
