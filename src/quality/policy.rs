//! Acceptance thresholds applied to a [`QualityScore`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::scorer::QualityScore;

/// Why a candidate failed the quality gate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QualityIssue {
    #[error("syntax validity {percent}% below threshold {threshold}%")]
    SyntaxInvalid { percent: f64, threshold: f64 },

    #[error("too many lines: {lines} > {max}")]
    TooLong { lines: usize, max: usize },

    #[error("too few lines: {lines} < {min}")]
    TooShort { lines: usize, min: usize },

    #[error("not enough functions: {found} < {min}")]
    MissingFunction { found: usize, min: usize },

    #[error("too many comment lines: {comments} > {max}")]
    TooManyComments { comments: usize, max: usize },
}

/// Thresholds for the quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityPolicy {
    pub min_syntax_valid_percent: f64,
    pub min_lines: usize,
    pub max_lines: usize,
    pub min_functions: usize,
    pub max_comment_lines: usize,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            min_syntax_valid_percent: 70.0,
            min_lines: 3,
            max_lines: 100,
            min_functions: 1,
            max_comment_lines: 20,
        }
    }
}

impl QualityPolicy {
    /// Returns the first threshold the score violates, if any.
    ///
    /// Checked in order: syntax validity, line ceiling, line floor, function
    /// count, comment ceiling.
    pub fn evaluate(&self, score: &QualityScore) -> Option<QualityIssue> {
        let percent = score.syntax_valid_percent();
        if percent < self.min_syntax_valid_percent {
            return Some(QualityIssue::SyntaxInvalid {
                percent,
                threshold: self.min_syntax_valid_percent,
            });
        }
        if score.line_count > self.max_lines {
            return Some(QualityIssue::TooLong {
                lines: score.line_count,
                max: self.max_lines,
            });
        }
        if score.line_count < self.min_lines {
            return Some(QualityIssue::TooShort {
                lines: score.line_count,
                min: self.min_lines,
            });
        }
        if score.function_count < self.min_functions {
            return Some(QualityIssue::MissingFunction {
                found: score.function_count,
                min: self.min_functions,
            });
        }
        if score.comment_count > self.max_comment_lines {
            return Some(QualityIssue::TooManyComments {
                comments: score.comment_count,
                max: self.max_comment_lines,
            });
        }
        None
    }
}
