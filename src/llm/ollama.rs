use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ChatCompletion, ChatModel, ChatRequest};
use crate::config::LlmConfig;
use crate::conversation::{Message, ToolCall};
use crate::error::{LlmError, LlmResult};
use crate::tools::{ToolDefinition, ToolName};

/// Client for a local Ollama server's chat API.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f64,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a new Ollama client from configuration.
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(LlmError::Http)?;

        Ok(Self {
            client,
            base_url: config.ollama_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn chat(&self, request: ChatRequest) -> LlmResult<ChatCompletion> {
        let url = format!("{}/api/chat", self.base_url);

        let body = OllamaChatRequest {
            model: &self.model,
            messages: request.messages.iter().map(to_wire_message).collect(),
            stream: false,
            // Ollama has no tool_choice field; forced selection is carried
            // by the node's prompt, so the steering flag is not sent.
            tools: request.tools.iter().map(to_wire_tool).collect(),
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        debug!(
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Calling Ollama chat API"
        );

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    LlmError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let chat_response: OllamaChatResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponse {
                    message: format!("Failed to parse JSON response: {}", e),
                })?;

        let completion = from_wire_message(chat_response.message)?;

        info!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis(),
            tool_calls = completion.tool_calls.len(),
            "Ollama completion received"
        );

        Ok(completion)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OllamaFunction,
}

#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

fn to_wire_message(message: &Message) -> OllamaMessage {
    match message {
        Message::System { content } => OllamaMessage {
            role: "system".to_string(),
            content: content.clone(),
            tool_calls: None,
        },
        Message::User { content } => OllamaMessage {
            role: "user".to_string(),
            content: content.clone(),
            tool_calls: None,
        },
        Message::Assistant {
            content,
            tool_calls,
        } => OllamaMessage {
            role: "assistant".to_string(),
            content: content.clone(),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(
                    tool_calls
                        .iter()
                        .map(|c| OllamaToolCall {
                            function: OllamaFunctionCall {
                                name: c.name.to_string(),
                                arguments: c.arguments.clone(),
                            },
                        })
                        .collect(),
                )
            },
        },
        Message::Tool { content, .. } => OllamaMessage {
            role: "tool".to_string(),
            content: content.clone(),
            tool_calls: None,
        },
    }
}

fn to_wire_tool(tool: &ToolDefinition) -> OllamaTool {
    OllamaTool {
        kind: "function",
        function: OllamaFunction {
            name: tool.name.to_string(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

fn from_wire_message(message: OllamaMessage) -> LlmResult<ChatCompletion> {
    let mut tool_calls = Vec::new();
    for call in message.tool_calls.unwrap_or_default() {
        let name = ToolName::from_str(&call.function.name)?;
        tool_calls.push(ToolCall::new(
            super::fresh_call_id(),
            name,
            call.function.arguments,
        ));
    }

    Ok(ChatCompletion {
        content: message.content,
        tool_calls,
    })
}
