//! Convenience recorder over the global metrics.

use super::prometheus::{ATTEMPTS_TOTAL, EXECUTION_DURATION, FEEDBACK_REQUEUED, SAMPLES_TOTAL};

/// Records pipeline events into the global Prometheus metrics.
///
/// Every method is a no-op until `init_metrics()` has run, so library code can
/// record unconditionally.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record a sample's final disposition (e.g. "accepted", "permanently_failed").
    pub fn record_sample(&self, outcome: &str) {
        if let Some(samples) = SAMPLES_TOTAL.get() {
            samples.with_label_values(&[outcome]).inc();
        }
        tracing::trace!(outcome = outcome, "Recorded sample metric");
    }

    /// Record one generation attempt and the gate result it ended with.
    pub fn record_attempt(&self, result: &str) {
        if let Some(attempts) = ATTEMPTS_TOTAL.get() {
            attempts.with_label_values(&[result]).inc();
        }
    }

    pub fn record_execution(&self, duration_secs: f64) {
        if let Some(histogram) = EXECUTION_DURATION.get() {
            histogram.observe(duration_secs);
        }
    }

    pub fn record_requeued(&self, count: usize) {
        if let Some(counter) = FEEDBACK_REQUEUED.get() {
            counter.inc_by(count as f64);
        }
    }
}
