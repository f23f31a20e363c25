//! Shared fixtures for integration tests: a scripted chat model and a
//! small in-memory slice of the Chinook schema.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sql_agent::agent::{ApprovalMode, SqlAgent};
use sql_agent::config::AgentConfig;
use sql_agent::conversation::ToolCall;
use sql_agent::db::SqlDatabase;
use sql_agent::error::{LlmError, LlmResult};
use sql_agent::llm::{ChatCompletion, ChatModel, ChatRequest};
use sql_agent::tools::{ToolName, ToolRegistry};

/// One scripted model turn.
pub enum ScriptStep {
    /// Reply with plain text.
    Text(&'static str),
    /// Reply with a single tool call.
    Call(ToolName, serde_json::Value),
    /// Fail with an invalid-response error carrying this message.
    Error(&'static str),
}

/// Deterministic [`ChatModel`] that replays a fixed script and records
/// every request it receives.
pub struct ScriptedModel {
    steps: Mutex<VecDeque<ScriptStep>>,
    requests: Mutex<Vec<ChatRequest>>,
    counter: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(steps: Vec<ScriptStep>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        })
    }

    /// Number of chat calls made so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Snapshot of every request received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, request: ChatRequest) -> LlmResult<ChatCompletion> {
        self.requests.lock().unwrap().push(request);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("model script exhausted");

        match step {
            ScriptStep::Text(text) => Ok(ChatCompletion {
                content: text.to_string(),
                tool_calls: Vec::new(),
            }),
            ScriptStep::Call(name, arguments) => {
                let id = format!("scripted_{}", self.counter.fetch_add(1, Ordering::SeqCst));
                Ok(ChatCompletion {
                    content: String::new(),
                    tool_calls: vec![ToolCall::new(id, name, arguments)],
                })
            }
            ScriptStep::Error(message) => Err(LlmError::InvalidResponse {
                message: message.to_string(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// In-memory database with a small slice of the Chinook schema.
pub async fn chinook_mini() -> SqlDatabase {
    let db = SqlDatabase::open_in_memory().await.unwrap();
    let statements = [
        "CREATE TABLE Genre (GenreId INTEGER PRIMARY KEY, Name TEXT)",
        "CREATE TABLE Artist (ArtistId INTEGER PRIMARY KEY, Name TEXT)",
        "CREATE TABLE Album (AlbumId INTEGER PRIMARY KEY, Title TEXT, ArtistId INTEGER)",
        "INSERT INTO Genre (GenreId, Name) VALUES (1, 'Rock'), (2, 'Jazz'), (3, 'Metal')",
        "INSERT INTO Artist (ArtistId, Name) VALUES (1, 'AC/DC'), (2, 'Iron Maiden')",
        "INSERT INTO Album (AlbumId, Title, ArtistId) VALUES \
         (1, 'For Those About To Rock We Salute You', 1), \
         (2, 'Let There Be Rock', 1), \
         (3, 'The Number of the Beast', 2)",
    ];
    for statement in statements {
        sqlx::query(statement).execute(db.pool()).await.unwrap();
    }
    db
}

/// Build an agent over the given scripted model and database.
pub async fn build_agent(
    model: Arc<ScriptedModel>,
    db: SqlDatabase,
    approval: ApprovalMode,
) -> SqlAgent {
    SqlAgent::new(model, ToolRegistry::new(db), approval, &AgentConfig::default())
}

/// Build an agent with a custom iteration cap.
pub async fn build_agent_with_max_iterations(
    model: Arc<ScriptedModel>,
    db: SqlDatabase,
    approval: ApprovalMode,
    max_iterations: u32,
) -> SqlAgent {
    let config = AgentConfig {
        max_iterations,
        ..AgentConfig::default()
    };
    SqlAgent::new(model, ToolRegistry::new(db), approval, &config)
}
