use thiserror::Error;
use uuid::Uuid;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid or missing configuration; fatal at startup.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// Database layer failure.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// LLM provider failure.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Agent graph failure.
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    /// Approval gate misuse.
    #[error("Approval error: {0}")]
    Approval(#[from] ApprovalError),

    /// Anything that does not fit the other variants.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

/// Database layer errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Could not open or reach the database file.
    #[error("Database connection failed: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// A schema lookup named a table that does not exist.
    #[error("table '{name}' not found in the database")]
    TableNotFound {
        /// The missing table name.
        name: String,
    },

    /// A query failed to execute.
    #[error("Query failed: {message}")]
    Query {
        /// Error text reported by the database.
        message: String,
    },

    /// Error bubbled up from sqlx.
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// LLM provider errors
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider returned a non-success HTTP status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// The provider response could not be decoded.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the decoding failure.
        message: String,
    },

    /// The model requested a tool that is not registered.
    #[error("Unknown tool: {name}")]
    UnknownTool {
        /// The unrecognized tool name.
        name: String,
    },

    /// The request exceeded the configured timeout.
    #[error("Request timeout after {timeout_secs}s")]
    Timeout {
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },

    /// Transport-level error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Agent graph errors
#[derive(Debug, Error)]
pub enum AgentError {
    /// A node that requires a tool call got a text-only model reply.
    #[error("model returned no tool call at node '{node}'")]
    MissingToolCall {
        /// Name of the node whose contract was violated.
        node: String,
    },

    /// LLM failure inside a node.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Approval gate errors
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// The approval id is unknown or was already resolved.
    #[error("approval {id} not found or already resolved")]
    AlreadyResolved {
        /// The approval id that failed to resolve.
        id: Uuid,
    },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for approval operations
pub type ApprovalResult<T> = Result<T, ApprovalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_database_error_display() {
        let err = DatabaseError::Connection {
            message: "failed to connect".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Database connection failed: failed to connect"
        );

        let err = DatabaseError::TableNotFound {
            name: "Genre".to_string(),
        };
        assert_eq!(err.to_string(), "table 'Genre' not found in the database");

        let err = DatabaseError::Query {
            message: "syntax error".to_string(),
        };
        assert_eq!(err.to_string(), "Query failed: syntax error");
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::Api {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 401 - unauthorized");

        let err = LlmError::InvalidResponse {
            message: "malformed JSON".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid response: malformed JSON");

        let err = LlmError::UnknownTool {
            name: "drop_tables".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown tool: drop_tables");

        let err = LlmError::Timeout { timeout_secs: 120 };
        assert_eq!(err.to_string(), "Request timeout after 120s");
    }

    #[test]
    fn test_agent_error_display() {
        let err = AgentError::MissingToolCall {
            node: "call_get_schema".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "model returned no tool call at node 'call_get_schema'"
        );
    }

    #[test]
    fn test_llm_error_conversion_to_agent_error() {
        let llm_err = LlmError::Timeout { timeout_secs: 30 };
        let agent_err: AgentError = llm_err.into();
        assert!(matches!(agent_err, AgentError::Llm(_)));
    }

    #[test]
    fn test_agent_error_conversion_to_app_error() {
        let agent_err = AgentError::MissingToolCall {
            node: "check_query".to_string(),
        };
        let app_err: AppError = agent_err.into();
        assert!(matches!(app_err, AppError::Agent(_)));
        assert!(app_err.to_string().contains("check_query"));
    }

    #[test]
    fn test_approval_error_conversion_to_app_error() {
        let id = Uuid::new_v4();
        let approval_err = ApprovalError::AlreadyResolved { id };
        let app_err: AppError = approval_err.into();
        assert!(matches!(app_err, AppError::Approval(_)));
        assert!(app_err.to_string().contains(&id.to_string()));
    }
}
