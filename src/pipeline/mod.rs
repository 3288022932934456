//! Curation pipeline: retry controller, batch driver and feedback loop.
//!
//! # Pipeline Flow
//!
//! 1. **Generate**: the external generator produces candidate text
//! 2. **Format**: structured data and degenerate output are routed out without retry
//! 3. **Execute**: the candidate runs in the sandbox with a timeout
//! 4. **Score**: structural thresholds from [`crate::quality::QualityPolicy`]
//! 5. **Validate**: the ordered semantic rule table
//! 6. **Dedupe**: rejects candidates that duplicate an accepted sample
//! 7. **Store**: the final disposition is appended to its partition
//!
//! Any retryable failure sends the sample back to step 1 until the retry
//! ceiling is reached; it is then stored as permanently failed. The
//! [`FeedbackLoop`] later turns such failures into fresh pending samples.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use script_forge::pipeline::{PipelineConfig, RetryController};
//! use script_forge::runner::Sandbox;
//!
//! let config = PipelineConfig::from_env()?;
//! let executor = Arc::new(Sandbox::new(config.sandbox_config()));
//! let mut controller = RetryController::new(config, generator, executor)?;
//!
//! let report = controller.run_batch().await?;
//! println!("accepted {} of {}", report.stats.accepted, report.stats.processed);
//! ```

pub mod config;
pub mod feedback;
pub mod orchestrator;
pub mod outcome;

pub use config::{ConfigError, PipelineConfig};
pub use feedback::{FeedbackLoop, FeedbackReport};
pub use orchestrator::{PipelineError, PipelineStats, RetryController, RunReport};
pub use outcome::{Rejection, SampleOutcome};
