//! LLM provider abstraction.
//!
//! The model is a black-box completion function: it receives the message
//! log plus the tool definitions it may use, and returns either text or
//! requested tool invocations. Providers differ only in wire format;
//! [`ChatModel`] is the seam the agent graph is written against.

mod gemini;
mod ollama;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{LlmConfig, LlmProvider};
use crate::conversation::{Message, ToolCall};
use crate::error::{AppError, LlmResult};
use crate::tools::ToolDefinition;

/// How strongly the model is steered toward calling a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model may answer in text or call a tool.
    Auto,
    /// The model must call one of the offered tools.
    Required,
}

/// One completion request: full history plus the tools on offer.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Messages in conversation order.
    pub messages: Vec<Message>,
    /// Tools the model may request.
    pub tools: Vec<ToolDefinition>,
    /// Tool-choice steering.
    pub tool_choice: ToolChoice,
}

/// The model's reply: text, tool calls, or both.
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    /// Free-text content (may be empty).
    pub content: String,
    /// Requested tool invocations (empty for a plain text reply).
    pub tool_calls: Vec<ToolCall>,
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion over the given request.
    async fn chat(&self, request: ChatRequest) -> LlmResult<ChatCompletion>;

    /// Name of the underlying model, for logging.
    fn model_name(&self) -> &str;
}

/// Build the configured chat model (Ollama or Gemini).
pub fn build_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>, AppError> {
    info!(provider = %config.provider, model = %config.model, "Using LLM provider");
    match config.provider {
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::new(config)?)),
        LlmProvider::Gemini => Ok(Arc::new(GeminiClient::new(config)?)),
    }
}

/// Synthesize a unique id for a provider that does not assign call ids.
pub(crate) fn fresh_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}
