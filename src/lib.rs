//! script-forge: curation pipeline for generated code samples.
//!
//! Tasks from a pending pool are turned into candidate programs by an external
//! generator, run in a sandbox, scored, checked against their description and
//! deduplicated. Failed attempts are retried up to a ceiling and every final
//! disposition is appended to its own JSON Lines partition.

// Core modules
pub mod cli;
pub mod diversity;
pub mod error;
pub mod generator;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod quality;
pub mod runner;
pub mod sample;
pub mod storage;
pub mod validation;

// Re-export commonly used types
pub use error::{GenerationError, LlmError, StoreError};
pub use pipeline::{PipelineConfig, PipelineError, RetryController};
pub use sample::{Sample, SampleState};
pub use storage::{DatasetStore, Partition};
