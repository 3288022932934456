//! Named dataset partitions and where they live on disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An append-only output bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Partition {
    Accepted,
    /// Semantic or quality failures, with `rejected_reason`.
    Rejected,
    NonProgramOutput,
    TooShort,
    /// Execution failures, with `error`.
    ExecutionError,
    PermanentlyFailed,
}

impl Partition {
    pub const ALL: [Partition; 6] = [
        Partition::Accepted,
        Partition::Rejected,
        Partition::NonProgramOutput,
        Partition::TooShort,
        Partition::ExecutionError,
        Partition::PermanentlyFailed,
    ];

    /// Partitions holding a sample's final disposition.
    pub const TERMINAL: [Partition; 4] = [
        Partition::Accepted,
        Partition::PermanentlyFailed,
        Partition::NonProgramOutput,
        Partition::TooShort,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Partition::Accepted => "accepted",
            Partition::Rejected => "rejected",
            Partition::NonProgramOutput => "non-program-output",
            Partition::TooShort => "too-short",
            Partition::ExecutionError => "execution-error",
            Partition::PermanentlyFailed => "permanently-failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace('_', "-");
        Partition::ALL
            .into_iter()
            .find(|p| p.name() == normalized)
            .ok_or_else(|| format!("Unknown partition: {}", s))
    }
}

/// File location of every partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionPaths {
    pub accepted: PathBuf,
    pub rejected: PathBuf,
    pub non_program_output: PathBuf,
    pub too_short: PathBuf,
    pub execution_error: PathBuf,
    pub permanently_failed: PathBuf,
}

impl PartitionPaths {
    /// `<dir>/<partition-name>.jsonl` for every partition.
    pub fn under(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let file = |p: Partition| dir.join(format!("{}.jsonl", p.name()));
        Self {
            accepted: file(Partition::Accepted),
            rejected: file(Partition::Rejected),
            non_program_output: file(Partition::NonProgramOutput),
            too_short: file(Partition::TooShort),
            execution_error: file(Partition::ExecutionError),
            permanently_failed: file(Partition::PermanentlyFailed),
        }
    }

    pub fn path(&self, partition: Partition) -> &Path {
        match partition {
            Partition::Accepted => &self.accepted,
            Partition::Rejected => &self.rejected,
            Partition::NonProgramOutput => &self.non_program_output,
            Partition::TooShort => &self.too_short,
            Partition::ExecutionError => &self.execution_error,
            Partition::PermanentlyFailed => &self.permanently_failed,
        }
    }
}

impl Default for PartitionPaths {
    fn default() -> Self {
        Self::under("data")
    }
}
