//! Quality gate for candidate programs.
//!
//! [`QualityScorer`] measures structure without running anything;
//! [`QualityPolicy`] turns a score into pass or a [`QualityIssue`].

mod policy;
mod scorer;
mod summary;

pub use policy::{QualityIssue, QualityPolicy};
pub use scorer::{is_valid_python, QualityScore, QualityScorer};
pub use summary::{ScoreLogEntry, ScoreSummary};
