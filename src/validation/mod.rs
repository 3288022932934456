//! Content gates that do not need to run the candidate.
//!
//! - [`format`]: rejects output that is not recognizable as a program (not retried)
//! - [`semantic`]: checks the program against what its task asks for

pub mod format;
pub mod semantic;

pub use format::{check_format, FormatRejection, MIN_PROGRAM_LINES};
pub use semantic::{RuleProfile, SemanticRejection, SemanticValidator};
