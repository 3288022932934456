//! Aggregate statistics over a scoring pass.

use serde::{Deserialize, Serialize};

use super::scorer::QualityScore;

/// One line of the per-sample score log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreLogEntry {
    pub id: String,
    pub task_description: String,
    pub score: QualityScore,
}

/// Averages over every scored sample, rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub total: usize,
    pub avg_line_count: f64,
    pub avg_function_count: f64,
    pub avg_comment_count: f64,
    pub avg_variable_count: f64,
    pub syntax_valid_percent: f64,
}

impl ScoreSummary {
    /// Summarizes `scores`; `None` when there is nothing to summarize.
    pub fn from_scores(scores: &[QualityScore]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f64;
        let avg = |f: fn(&QualityScore) -> usize| {
            round2(scores.iter().map(f).sum::<usize>() as f64 / n)
        };
        let valid = scores.iter().filter(|s| s.syntax_valid).count() as f64;

        Some(Self {
            total: scores.len(),
            avg_line_count: avg(|s| s.line_count),
            avg_function_count: avg(|s| s.function_count),
            avg_comment_count: avg(|s| s.comment_count),
            avg_variable_count: avg(|s| s.variable_count),
            syntax_valid_percent: round2(valid / n * 100.0),
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
