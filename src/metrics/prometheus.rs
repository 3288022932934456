//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by script_forge and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::sync::{Mutex, OnceLock};

/// Global Prometheus registry for all script_forge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Samples reaching a final disposition, labeled by outcome.
pub static SAMPLES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Generation attempts, labeled by the gate result.
pub static ATTEMPTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Sandbox execution duration in seconds.
pub static EXECUTION_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Pending samples created by the feedback loop.
pub static FEEDBACK_REQUEUED: OnceLock<Counter> = OnceLock::new();

static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Initialize all metrics and register them with the registry.
///
/// Safe to call more than once: later calls leave the first registration in
/// place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically due to
/// duplicate metric names or invalid metric configurations.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let samples_total = CounterVec::new(
        Opts::new(
            "script_forge_samples_total",
            "Samples reaching a final disposition",
        ),
        &["outcome"],
    )?;

    let attempts_total = CounterVec::new(
        Opts::new("script_forge_attempts_total", "Generation attempts by result"),
        &["result"],
    )?;

    let execution_duration = Histogram::with_opts(
        HistogramOpts::new(
            "script_forge_execution_duration_seconds",
            "Sandbox execution duration in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )?;

    let feedback_requeued = Counter::new(
        "script_forge_feedback_requeued_total",
        "Pending samples created by the feedback loop",
    )?;

    registry.register(Box::new(samples_total.clone()))?;
    registry.register(Box::new(attempts_total.clone()))?;
    registry.register(Box::new(execution_duration.clone()))?;
    registry.register(Box::new(feedback_requeued.clone()))?;

    // If any of these fail, metrics were already initialized (idempotent)
    let _ = REGISTRY.set(registry);
    let _ = SAMPLES_TOTAL.set(samples_total);
    let _ = ATTEMPTS_TOTAL.set(attempts_total);
    let _ = EXECUTION_DURATION.set(execution_duration);
    let _ = FEEDBACK_REQUEUED.set(feedback_requeued);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead when the registry was never initialized or
/// encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
