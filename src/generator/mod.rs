//! Candidate program generation.
//!
//! The generative model is an external collaborator: the pipeline only needs
//! something that turns a task description and its context into program text.
//! That seam is the [`Generator`] trait. [`LlmGenerator`] implements it over any
//! [`crate::llm::LlmProvider`]; tests use scripted implementations.
//!
//! Raw model output is often wrapped in markdown or cut off mid-line, so the
//! pipeline passes it through [`sanitize`] before any gate sees it.

pub mod llm;
pub mod sanitize;

pub use llm::{LlmGenerator, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
pub use sanitize::sanitize;

use async_trait::async_trait;

use crate::error::GenerationError;

/// Produces a candidate program for a task.
///
/// Implementations may be slow and may fail; failures are treated by the
/// pipeline as a consumed attempt, never as fatal.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        task_description: &str,
        context: &str,
    ) -> Result<String, GenerationError>;
}
