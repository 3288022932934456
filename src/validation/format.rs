//! Format gate: is the candidate recognizable as a program at all?

use thiserror::Error;

/// Why a candidate was not treated as source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatRejection {
    /// Output looks like structured data rather than code.
    #[error("output looks like structured data, not a program")]
    NonProgram,

    #[error("output has fewer than {min} lines")]
    TooShort { min: usize },
}

/// Minimum number of lines for a candidate to be considered at all.
pub const MIN_PROGRAM_LINES: usize = 2;

/// Checks the raw shape of a candidate before it is run.
pub fn check_format(candidate: &str) -> Result<(), FormatRejection> {
    let trimmed = candidate.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Err(FormatRejection::NonProgram);
    }
    if trimmed.lines().count() < MIN_PROGRAM_LINES {
        return Err(FormatRejection::TooShort {
            min: MIN_PROGRAM_LINES,
        });
    }
    Ok(())
}
