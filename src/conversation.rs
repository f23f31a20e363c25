//! Conversation state threaded through an agent run.
//!
//! A run owns exactly one [`Conversation`]: an ordered, append-only log of
//! messages. Nodes read the full log and append new messages; nothing is
//! ever rewritten or removed, which is what makes a suspended run
//! serializable and resumable.

use serde::{Deserialize, Serialize};

use crate::tools::ToolName;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call identifier, echoed back by the matching tool result.
    pub id: String,
    /// Which registered tool to invoke.
    pub name: ToolName,
    /// Structured argument payload.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: impl Into<String>, name: ToolName, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name,
            arguments,
        }
    }
}

/// One entry in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// Operating policy given to the model.
    System {
        /// Instruction text.
        content: String,
    },
    /// Free-text question from the caller.
    User {
        /// Question text.
        content: String,
    },
    /// Model output: free text, requested tool calls, or both.
    Assistant {
        /// Answer or commentary text (may be empty when tool calls are present).
        content: String,
        /// Requested tool invocations; empty for a plain text reply.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Outcome of one prior tool invocation.
    Tool {
        /// Identifier of the call this result answers.
        tool_call_id: String,
        /// Success payload or error description.
        content: String,
        /// True when the content describes a failure.
        #[serde(default)]
        is_error: bool,
    },
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Create a plain-text assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant message carrying tool calls.
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    /// Create a successful tool result.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Create a tool result describing a failure.
    pub fn tool_error(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }

    /// Tool calls carried by this message (empty unless an assistant
    /// message requested any).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Text content of this message.
    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    /// Whether this is an assistant message.
    pub fn is_assistant(&self) -> bool {
        matches!(self, Message::Assistant { .. })
    }
}

/// Ordered, append-only message log owned by a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation seeded with the user's question.
    pub fn with_question(question: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(question)],
        }
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Tool calls of the most recent message, if it is an assistant
    /// message; empty otherwise. This is what the conditional edge and the
    /// tool-executing nodes inspect.
    pub fn last_tool_calls(&self) -> &[ToolCall] {
        self.messages.last().map(Message::tool_calls).unwrap_or(&[])
    }

    /// The most recent assistant message with non-empty text; this is the
    /// final answer once the run terminates.
    pub fn final_answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.is_assistant())
            .map(Message::content)
            .find(|c| !c.is_empty())
    }

    /// Tool calls that have not yet received a result, oldest first.
    pub fn unanswered_calls(&self) -> Vec<&ToolCall> {
        let mut open: Vec<&ToolCall> = Vec::new();
        for message in &self.messages {
            match message {
                Message::Assistant { tool_calls, .. } => open.extend(tool_calls.iter()),
                Message::Tool { tool_call_id, .. } => {
                    open.retain(|c| c.id != *tool_call_id);
                }
                _ => {}
            }
        }
        open
    }
}
