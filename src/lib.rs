//! # SQL Agent
//!
//! A natural-language-to-SQL assistant over SQLite: a question drives a
//! language model through a fixed sequence of database-introspection and
//! query-generation steps, with an optional human-approval pause before
//! any generated SQL is executed, and a final answer grounded in query
//! results.
//!
//! ## Architecture
//!
//! ```text
//! HTTP client → Query Service (axum) → Agent Graph → LLM (Ollama/Gemini)
//!                                          ↓
//!                                    SQLite (sqlx)
//! ```
//!
//! The agent graph is a small state machine:
//!
//! ```text
//! list_tables → call_get_schema → get_schema → generate_query
//!                                                   │
//!                                 ┌── no tool call ─┴─ tool call ──┐
//!                                 ▼                                ▼
//!                                end                          check_query
//!                                 ▲                                │
//!                                 └── generate_query ◄── run_query ┘
//!                                                      (approval gate)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sql_agent::{Config, SqlAgent};
//! use sql_agent::agent::ApprovalMode;
//! use sql_agent::db::SqlDatabase;
//! use sql_agent::llm::build_model;
//! use sql_agent::tools::ToolRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let db = SqlDatabase::connect(&config.database).await?;
//!     let model = build_model(&config.llm)?;
//!     let agent = SqlAgent::new(
//!         model,
//!         ToolRegistry::new(db),
//!         ApprovalMode::Required,
//!         &config.agent,
//!     );
//!     let outcome = agent.run("What are all the genres?").await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// The agent state machine and human-approval gate.
pub mod agent;
/// Configuration management loaded from the environment.
pub mod config;
/// Conversation state: the append-only message log.
pub mod conversation;
/// SQLite access layer.
pub mod db;
/// Error types and result aliases for the application.
pub mod error;
/// Batch evaluation harness and test corpus.
pub mod eval;
/// LLM provider clients (Ollama, Gemini).
pub mod llm;
/// Logging setup shared by the binaries.
pub mod logging;
/// System prompts for query generation and review.
pub mod prompts;
/// HTTP query service facade.
pub mod server;
/// The fixed tool set exposed to the model.
pub mod tools;

pub use agent::{AgentOutcome, ApprovalMode, SqlAgent};
pub use config::Config;
pub use conversation::{Conversation, Message};
pub use error::{AppError, AppResult};
