//! Tagged results of one generation attempt and of a whole sample.

use thiserror::Error;

use crate::quality::QualityIssue;
use crate::sample::Sample;
use crate::storage::Partition;
use crate::validation::{FormatRejection, SemanticRejection};

/// Why an attempt did not produce an acceptable sample.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    /// The generator failed or returned nothing usable.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The candidate exited non-zero, raised or timed out. Carries the
    /// captured diagnostic verbatim.
    #[error("{0}")]
    Execution(String),

    #[error("{0}")]
    Quality(QualityIssue),

    #[error("{0}")]
    Semantic(SemanticRejection),

    #[error("duplicate of an accepted sample")]
    Duplicate,

    #[error("{0}")]
    Format(FormatRejection),
}

impl Rejection {
    /// Format rejections are final; everything else earns another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Rejection::Format(_))
    }

    /// Partition an attempt with this rejection is recorded in.
    pub fn partition(&self) -> Partition {
        match self {
            Rejection::Generation(_) | Rejection::Execution(_) => Partition::ExecutionError,
            Rejection::Quality(_) | Rejection::Semantic(_) | Rejection::Duplicate => {
                Partition::Rejected
            }
            Rejection::Format(FormatRejection::NonProgram) => Partition::NonProgramOutput,
            Rejection::Format(FormatRejection::TooShort { .. }) => Partition::TooShort,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::Generation(_) => "generation",
            Rejection::Execution(_) => "execution",
            Rejection::Quality(_) => "quality",
            Rejection::Semantic(_) => "semantic",
            Rejection::Duplicate => "duplicate",
            Rejection::Format(FormatRejection::NonProgram) => "non_program",
            Rejection::Format(FormatRejection::TooShort { .. }) => "too_short",
        }
    }

    /// Stores the diagnostic on the sample: `error` for generation and
    /// execution failures, `rejected_reason` for everything else.
    pub fn annotate(&self, sample: Sample) -> Sample {
        match self {
            Rejection::Generation(_) | Rejection::Execution(_) => sample.with_error(self.to_string()),
            _ => sample.with_rejected_reason(self.to_string()),
        }
    }
}

/// Final disposition of one sample.
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    /// The sample as stored, with its diagnostic and attempt count.
    pub sample: Sample,
    /// Partition holding the terminal record.
    pub partition: Partition,
    /// Last rejection, `None` when accepted.
    pub rejection: Option<Rejection>,
}

impl SampleOutcome {
    pub fn is_accepted(&self) -> bool {
        self.partition == Partition::Accepted
    }

    /// Label for the outcome metric.
    pub fn label(&self) -> &'static str {
        match self.partition {
            Partition::Accepted => "accepted",
            Partition::NonProgramOutput => "non_program_output",
            Partition::TooShort => "too_short",
            _ => "permanently_failed",
        }
    }
}
