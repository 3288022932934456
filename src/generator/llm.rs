//! LLM-backed candidate generator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::Generator;
use crate::error::GenerationError;
use crate::llm::{CompletionRequest, LlmProvider, Message};

/// Sampling temperature used for generation.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Token budget for one candidate.
pub const DEFAULT_MAX_TOKENS: u32 = 300;

const SYSTEM_PROMPT: &str = "You write complete, runnable Python scripts. \
Reply with the script only: no explanations, no markdown.";

/// Generator that asks an LLM for a Python script.
pub struct LlmGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Builds the user prompt for a task.
    pub fn build_prompt(task_description: &str, context: &str) -> String {
        format!(
            "# Instruction: Write a Python script using the requests module.\n\
             # Task: {}\n\
             # Details: {}\n\n",
            task_description, context
        )
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(
        &self,
        task_description: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let prompt = Self::build_prompt(task_description, context);
        let request = CompletionRequest::new(
            self.model.clone(),
            vec![Message::system(SYSTEM_PROMPT), Message::user(prompt.clone())],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let response = self.provider.complete(request).await?;
        let content = response.first_content().unwrap_or_default();

        // Completion-style servers echo the prompt back.
        let content = content.strip_prefix(prompt.as_str()).unwrap_or(content).trim();
        debug!(chars = content.len(), "Received candidate from LLM");

        if content.is_empty() {
            return Err(GenerationError::EmptyOutput);
        }
        Ok(content.to_string())
    }
}
