//! Command-line interface for script-forge.
//!
//! Provides the batch run plus the maintenance passes (dedupe, feedback,
//! score and validate) over the dataset partitions.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, run_with_config, Cli, Commands};
