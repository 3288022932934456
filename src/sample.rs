//! Sample records flowing through the curation pipeline.
//!
//! A [`Sample`] is one task plus its generated candidate program and, once a
//! gate has looked at it, its disposition. The same shape is used for pending
//! work, accepted records and every rejection partition; the optional
//! `rejected_reason` / `error` fields carry the diagnostic of the gate that
//! routed it.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of work and its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Opaque unique identifier, assigned on first sight if absent.
    #[serde(default)]
    pub id: String,

    /// What the candidate program must do.
    #[serde(alias = "instruction")]
    pub task_description: String,

    /// The data the program operates on (e.g. an HTTP request description).
    #[serde(default, alias = "input")]
    pub context: String,

    /// Generated program text; empty until generation runs.
    #[serde(default, rename = "output")]
    pub candidate_output: String,

    /// Reason set by the semantic/quality gates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_reason: Option<String>,

    /// Captured execution diagnostic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Generation attempts consumed.
    #[serde(default)]
    pub attempt_count: u32,

    /// Id of the failed sample this pending record was requeued from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requeued_from: Option<String>,
}

impl Sample {
    /// Creates a new pending sample with a fresh id.
    pub fn new(task_description: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_description: task_description.into(),
            context: context.into(),
            candidate_output: String::new(),
            rejected_reason: None,
            error: None,
            attempt_count: 0,
            requeued_from: None,
        }
    }

    /// Assigns a fresh id if the record arrived without one.
    ///
    /// Returns `true` when an id was assigned.
    pub fn ensure_id(&mut self) -> bool {
        if self.id.trim().is_empty() {
            self.id = Uuid::new_v4().to_string();
            true
        } else {
            false
        }
    }

    /// First eight characters of the id, used in log lines.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }

    /// Key identifying the task itself, independent of any generated output.
    pub fn task_key(&self) -> (String, String) {
        (self.task_description.clone(), self.context.clone())
    }

    /// Builds a fresh pending sample for the same task.
    ///
    /// The output and all prior diagnostics are discarded and a new id is
    /// assigned; this is how failures re-enter the pending pool. The new
    /// record remembers which sample it came from.
    pub fn to_pending(&self) -> Self {
        Self {
            requeued_from: Some(self.id.clone()),
            ..Self::new(self.task_description.clone(), self.context.clone())
        }
    }

    /// Returns a copy carrying a semantic/quality rejection reason.
    pub fn with_rejected_reason(mut self, reason: impl Into<String>) -> Self {
        self.rejected_reason = Some(reason.into());
        self.error = None;
        self
    }

    /// Returns a copy carrying an execution diagnostic.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.rejected_reason = None;
        self
    }

    /// Clears any diagnostic left by a previous attempt.
    pub fn clear_diagnostics(&mut self) {
        self.rejected_reason = None;
        self.error = None;
    }
}

/// Per-sample state machine positions, mirrored in the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleState {
    Pending,
    Generating,
    Executing,
    Scoring,
    Validating,
    Deduping,
    Accepted,
    Rejected,
    PermanentlyFailed,
}

impl SampleState {
    /// Returns true for the states a sample never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SampleState::Accepted | SampleState::Rejected | SampleState::PermanentlyFailed
        )
    }
}

impl fmt::Display for SampleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleState::Pending => "pending",
            SampleState::Generating => "generating",
            SampleState::Executing => "executing",
            SampleState::Scoring => "scoring",
            SampleState::Validating => "validating",
            SampleState::Deduping => "deduping",
            SampleState::Accepted => "accepted",
            SampleState::Rejected => "rejected",
            SampleState::PermanentlyFailed => "permanently_failed",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sample_is_pending() {
        let sample = Sample::new("fetch users", "GET http://api.example.com/users");
        assert!(!sample.id.is_empty());
        assert!(sample.candidate_output.is_empty());
        assert_eq!(sample.attempt_count, 0);
        assert!(sample.rejected_reason.is_none());
    }

    #[test]
    fn test_ensure_id_only_when_missing() {
        let mut sample: Sample =
            serde_json::from_str(r#"{"task_description": "t", "context": "c", "output": ""}"#)
                .unwrap();
        assert!(sample.id.is_empty());
        assert!(sample.ensure_id());
        let id = sample.id.clone();
        assert!(!sample.ensure_id());
        assert_eq!(sample.id, id);
    }

    #[test]
    fn test_reads_original_field_names() {
        let sample: Sample = serde_json::from_str(
            r#"{"id": "abc", "instruction": "do it", "input": "details", "output": "import os"}"#,
        )
        .unwrap();
        assert_eq!(sample.task_description, "do it");
        assert_eq!(sample.context, "details");
        assert_eq!(sample.candidate_output, "import os");
    }

    #[test]
    fn test_serialized_shape() {
        let sample = Sample {
            id: "id-1".to_string(),
            task_description: "t".to_string(),
            context: "c".to_string(),
            candidate_output: "print(1)".to_string(),
            rejected_reason: None,
            error: None,
            attempt_count: 2,
            requeued_from: None,
        };
        let value = serde_json::to_value(&sample).unwrap();
        assert_eq!(value["output"], "print(1)");
        assert!(value.get("rejected_reason").is_none());
        assert!(value.get("error").is_none());
        assert!(value.get("requeued_from").is_none());
    }

    #[test]
    fn test_diagnostics_are_exclusive() {
        let sample = Sample::new("t", "c").with_error("Traceback").with_rejected_reason("no imports");
        assert_eq!(sample.rejected_reason.as_deref(), Some("no imports"));
        assert!(sample.error.is_none());
    }

    #[test]
    fn test_to_pending_clears_output_and_reissues_id() {
        let mut failed = Sample::new("t", "c").with_error("boom");
        failed.candidate_output = "import x".to_string();
        failed.attempt_count = 3;

        let pending = failed.to_pending();
        assert_ne!(pending.id, failed.id);
        assert!(pending.candidate_output.is_empty());
        assert!(pending.error.is_none());
        assert_eq!(pending.attempt_count, 0);
        assert_eq!(pending.task_key(), failed.task_key());
        assert_eq!(pending.requeued_from.as_deref(), Some(failed.id.as_str()));
    }

    #[test]
    fn test_short_id() {
        let mut sample = Sample::new("t", "c");
        sample.id = "abc".to_string();
        assert_eq!(sample.short_id(), "abc");
        sample.id = "0123456789".to_string();
        assert_eq!(sample.short_id(), "01234567");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SampleState::PermanentlyFailed.to_string(), "permanently_failed");
        assert!(SampleState::Accepted.is_terminal());
        assert!(!SampleState::Scoring.is_terminal());
    }
}
