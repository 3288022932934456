//! LLM integration used by the candidate generator.
//!
//! ```ignore
//! use script_forge::llm::{ChatClient, CompletionRequest, LlmProvider, Message};
//!
//! let client = ChatClient::from_env()?;
//! let request = CompletionRequest::new("", vec![Message::user("Write a script")]);
//! let response = client.complete(request).await?;
//! ```

pub mod client;

pub use client::{
    ChatClient, Choice, CompletionRequest, CompletionResponse, LlmProvider, Message,
    DEFAULT_MODEL,
};
