use std::collections::HashMap;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{ChatCompletion, ChatModel, ChatRequest, ToolChoice};
use crate::config::LlmConfig;
use crate::conversation::{Message, ToolCall};
use crate::error::{LlmError, LlmResult};
use crate::tools::ToolName;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Client for the Google Gemini generateContent API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    timeout_secs: u64,
}

impl GeminiClient {
    /// Create a new Gemini client from configuration.
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(LlmError::Http)?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: config.google_api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Override the API base URL (for testing).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn chat(&self, request: ChatRequest) -> LlmResult<ChatCompletion> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let body = build_request_body(&request, self.temperature);

        debug!(
            model = %self.model,
            contents = body.contents.len(),
            "Calling Gemini generateContent API"
        );

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
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

        let gemini_response: GeminiResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::InvalidResponse {
                    message: format!("Failed to parse JSON response: {}", e),
                })?;

        let completion = parse_response(gemini_response)?;

        info!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis(),
            tool_calls = completion.tool_calls.len(),
            "Gemini completion received"
        );

        Ok(completion)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiToolDecls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<GeminiToolConfig>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_call: None,
            function_response: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolDecls {
    function_declarations: Vec<GeminiFunctionDecl>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDecl {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolConfig {
    function_calling_config: GeminiFunctionCallingConfig,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionCallingConfig {
    mode: &'static str,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

/// Convert the conversation into Gemini wire shape. System messages are
/// folded into the single system instruction; tool results are mapped to
/// function responses, which Gemini addresses by function name rather
/// than call id.
fn build_request_body(request: &ChatRequest, temperature: f64) -> GeminiRequest {
    let mut system_texts: Vec<&str> = Vec::new();
    let mut contents: Vec<GeminiContent> = Vec::new();
    let mut call_names: HashMap<&str, String> = HashMap::new();

    for message in &request.messages {
        match message {
            Message::System { content } => system_texts.push(content),
            Message::User { content } => contents.push(GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart::text(content.clone())],
            }),
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut parts = Vec::new();
                if !content.is_empty() {
                    parts.push(GeminiPart::text(content.clone()));
                }
                for call in tool_calls {
                    call_names.insert(call.id.as_str(), call.name.to_string());
                    parts.push(GeminiPart {
                        text: None,
                        function_call: Some(GeminiFunctionCall {
                            name: call.name.to_string(),
                            args: call.arguments.clone(),
                        }),
                        function_response: None,
                    });
                }
                contents.push(GeminiContent {
                    role: Some("model".to_string()),
                    parts,
                });
            }
            Message::Tool {
                tool_call_id,
                content,
                ..
            } => {
                let name = call_names
                    .get(tool_call_id.as_str())
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string());
                contents.push(GeminiContent {
                    role: Some("user".to_string()),
                    parts: vec![GeminiPart {
                        text: None,
                        function_call: None,
                        function_response: Some(GeminiFunctionResponse {
                            name,
                            response: json!({ "content": content }),
                        }),
                    }],
                });
            }
        }
    }

    let system_instruction = if system_texts.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart::text(system_texts.join("\n\n"))],
        })
    };

    let tool_config = if request.tools.is_empty() {
        None
    } else {
        Some(GeminiToolConfig {
            function_calling_config: GeminiFunctionCallingConfig {
                mode: match request.tool_choice {
                    ToolChoice::Auto => "AUTO",
                    ToolChoice::Required => "ANY",
                },
            },
        })
    };

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![GeminiToolDecls {
            function_declarations: request
                .tools
                .iter()
                .map(|t| GeminiFunctionDecl {
                    name: t.name.to_string(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                })
                .collect(),
        }]
    };

    GeminiRequest {
        system_instruction,
        contents,
        tools,
        tool_config,
        generation_config: GeminiGenerationConfig { temperature },
    }
}

fn parse_response(response: GeminiResponse) -> LlmResult<ChatCompletion> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| LlmError::InvalidResponse {
            message: "Failed to parse JSON response: no candidates returned".to_string(),
        })?;

    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for part in content.parts {
        if let Some(text) = part.text {
            text_parts.push(text);
        }
        if let Some(call) = part.function_call {
            let name = ToolName::from_str(&call.name)?;
            tool_calls.push(ToolCall::new(super::fresh_call_id(), name, call.args));
        }
    }

    Ok(ChatCompletion {
        content: text_parts.join(" "),
        tool_calls,
    })
}
