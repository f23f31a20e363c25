//! The three fixed capabilities exposed to the model.
//!
//! Tools are a closed set: the model selects one by name, the registry
//! validates the arguments and runs the executor. Executor failures never
//! escape as errors; they become the text payload of a tool-result
//! message so the model can self-correct on the next pass.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::conversation::{Message, ToolCall};
use crate::db::SqlDatabase;
use crate::error::LlmError;

/// Name of a registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// List the tables available in the database.
    ListTables,
    /// Fetch DDL and sample rows for named tables.
    GetSchema,
    /// Execute a SQL query.
    RunQuery,
}

impl ToolName {
    /// String form used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ListTables => "list_tables",
            ToolName::GetSchema => "get_schema",
            ToolName::RunQuery => "run_query",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolName {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list_tables" => Ok(ToolName::ListTables),
            "get_schema" => Ok(ToolName::GetSchema),
            "run_query" => Ok(ToolName::RunQuery),
            other => Err(LlmError::UnknownTool {
                name: other.to_string(),
            }),
        }
    }
}

/// Arguments for the schema-fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSchemaArgs {
    /// Tables whose schemas should be returned.
    pub table_names: Vec<String>,
}

/// Arguments for the query-execution tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunQueryArgs {
    /// The SQL statement to execute.
    pub query: String,
}

/// A tool exposed to the model: name, description, and a JSON schema for
/// its arguments. Immutable after construction.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: ToolName,
    /// Human-readable description consumed by the model.
    pub description: String,
    /// JSON schema of the argument object.
    pub parameters: serde_json::Value,
}

/// Statement verbs the agent refuses to execute. The generation prompt
/// already forbids these; this check is the backstop in front of the
/// approval gate and the executor.
const WRITE_VERBS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "replace", "truncate", "attach",
    "detach", "vacuum", "pragma",
];

/// Returns the offending verb when the statement is not read-only.
pub fn write_statement_verb(query: &str) -> Option<&'static str> {
    let first_word = query
        .trim_start()
        .trim_start_matches('(')
        .split_whitespace()
        .next()?
        .to_lowercase();
    WRITE_VERBS.iter().copied().find(|v| *v == first_word)
}

/// Registry binding tool names to their executors.
#[derive(Clone)]
pub struct ToolRegistry {
    db: SqlDatabase,
}

impl ToolRegistry {
    /// Create a registry over the given database.
    pub fn new(db: SqlDatabase) -> Self {
        Self { db }
    }

    /// SQL dialect of the backing database.
    pub fn dialect(&self) -> &'static str {
        self.db.dialect()
    }

    /// Definition of a single tool.
    pub fn definition(&self, name: ToolName) -> ToolDefinition {
        match name {
            ToolName::ListTables => ToolDefinition {
                name,
                description: "Input is an empty object, output is a comma-separated list \
                              of tables in the database."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {},
                }),
            },
            ToolName::GetSchema => ToolDefinition {
                name,
                description: "Get the schema and sample rows for the given tables. \
                              Be sure the tables actually exist by calling list_tables first."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "table_names": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Names of the tables to describe.",
                        }
                    },
                    "required": ["table_names"],
                }),
            },
            ToolName::RunQuery => ToolDefinition {
                name,
                description: "Execute a SQL query against the database and return the result. \
                              If the query is not correct, an error message will be returned. \
                              If an error is returned, rewrite the query, check the query, and \
                              try again."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "A syntactically correct SQL query.",
                        }
                    },
                    "required": ["query"],
                }),
            },
        }
    }

    /// Definitions of all registered tools.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            self.definition(ToolName::ListTables),
            self.definition(ToolName::GetSchema),
            self.definition(ToolName::RunQuery),
        ]
    }

    /// Execute a tool call and return its result message. Every failure
    /// mode short of a poisoned connection becomes error text linked to
    /// the call id.
    pub async fn execute(&self, call: &ToolCall) -> Message {
        debug!(tool = %call.name, call_id = %call.id, "Executing tool call");

        match call.name {
            ToolName::ListTables => match self.db.list_tables().await {
                Ok(tables) => Message::tool_result(&call.id, tables.join(", ")),
                Err(e) => Message::tool_error(&call.id, format!("Error: {}", e)),
            },
            ToolName::GetSchema => {
                let args = match parse_get_schema_args(&call.arguments) {
                    Ok(args) => args,
                    Err(reason) => {
                        warn!(call_id = %call.id, %reason, "Invalid get_schema arguments");
                        return Message::tool_error(&call.id, format!("Error: {}", reason));
                    }
                };
                match self.db.table_info(&args.table_names).await {
                    Ok(info) => Message::tool_result(&call.id, info),
                    Err(e) => Message::tool_error(&call.id, format!("Error: {}", e)),
                }
            }
            ToolName::RunQuery => {
                let args: RunQueryArgs = match serde_json::from_value(call.arguments.clone()) {
                    Ok(args) => args,
                    Err(e) => {
                        warn!(call_id = %call.id, error = %e, "Invalid run_query arguments");
                        return Message::tool_error(
                            &call.id,
                            format!("Error: invalid arguments for run_query: {}", e),
                        );
                    }
                };
                if let Some(verb) = write_statement_verb(&args.query) {
                    warn!(call_id = %call.id, verb, "Refusing non-read-only statement");
                    return Message::tool_error(
                        &call.id,
                        format!(
                            "Error: {} statements are not permitted; only read-only queries \
                             may be executed.",
                            verb.to_uppercase()
                        ),
                    );
                }
                match self.db.run_query(&args.query).await {
                    Ok(result) => Message::tool_result(&call.id, result),
                    Err(e) => Message::tool_error(&call.id, format!("Error: {}", e)),
                }
            }
        }
    }
}

/// Accept either `{"table_names": ["A", "B"]}` or a comma-separated
/// string, which smaller models sometimes emit.
fn parse_get_schema_args(arguments: &serde_json::Value) -> Result<GetSchemaArgs, String> {
    if let Ok(args) = serde_json::from_value::<GetSchemaArgs>(arguments.clone()) {
        return Ok(args);
    }
    if let Some(names) = arguments.get("table_names").and_then(|v| v.as_str()) {
        let table_names: Vec<String> = names
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !table_names.is_empty() {
            return Ok(GetSchemaArgs { table_names });
        }
    }
    Err(format!(
        "invalid arguments for get_schema: expected {{\"table_names\": [..]}}, got {}",
        arguments
    ))
}
