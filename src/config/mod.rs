use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// LLM provider configuration.
    pub llm: LlmConfig,
    /// SQLite database configuration.
    pub database: DatabaseConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Agent graph configuration.
    pub agent: AgentConfig,
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// LangSmith tracing credentials (pass-through; no core-logic effect).
    pub langsmith: LangsmithConfig,
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Local Ollama server.
    Ollama,
    /// Google Gemini API.
    Gemini,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::Gemini => write!(f, "gemini"),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider to use.
    pub provider: LlmProvider,
    /// Model name passed to the provider.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Base URL for the Ollama server.
    pub ollama_base_url: String,
    /// API key for Gemini (required when provider is gemini).
    pub google_api_key: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Maximum pool connections.
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub level: String,
    /// Log output format.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// Structured JSON output.
    Json,
}

/// Agent graph configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum passes through the query-generation node before the run is
    /// forced to terminate with an inconclusive answer.
    pub max_iterations: u32,
    /// Default row cap communicated to the model.
    pub top_k: u32,
    /// Optional lifetime for a pending approval, in seconds. Expired
    /// approvals resolve as rejections. `None` disables expiry.
    pub approval_timeout_secs: Option<u64>,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

/// LangSmith observability credentials. Stored and logged at startup so
/// operators can verify what was picked up; the agent itself does not use
/// them.
#[derive(Debug, Clone, Default)]
pub struct LangsmithConfig {
    /// API key, if set.
    pub api_key: String,
    /// Whether tracing was requested.
    pub tracing: bool,
    /// Collector endpoint.
    pub endpoint: String,
    /// Project name.
    pub project: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let provider_raw = env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string());
        let provider = match provider_raw.to_lowercase().as_str() {
            "ollama" => LlmProvider::Ollama,
            "gemini" => LlmProvider::Gemini,
            other => {
                return Err(AppError::Config {
                    message: format!("Unknown LLM_PROVIDER='{}'; use 'ollama' or 'gemini'", other),
                })
            }
        };

        // GOOGLE_API_KEY is canonical, GEMINI_API_KEY accepted as an alias
        let google_api_key = env::var("GOOGLE_API_KEY")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .unwrap_or_default();

        if provider == LlmProvider::Gemini && google_api_key.trim().is_empty() {
            return Err(AppError::Config {
                message: "GOOGLE_API_KEY (or GEMINI_API_KEY) is required when LLM_PROVIDER=gemini"
                    .to_string(),
            });
        }

        let llm = LlmConfig {
            provider,
            model: env::var("LLM_MODEL").unwrap_or_else(|_| "ministral-3:3b".to_string()),
            temperature: env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
            ollama_base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            google_api_key,
            timeout_secs: env::var("LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("SQLITE_DATABASE").unwrap_or_else(|_| "chinook.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let agent = AgentConfig {
            max_iterations: env::var("AGENT_MAX_ITERATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            top_k: env::var("AGENT_TOP_K")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            approval_timeout_secs: env::var("APPROVAL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
        };

        let server = ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
        };

        let langsmith = LangsmithConfig {
            api_key: env::var("LANGSMITH_API_KEY").unwrap_or_default(),
            tracing: env::var("LANGSMITH_TRACING")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            endpoint: env::var("LANGSMITH_ENDPOINT")
                .unwrap_or_else(|_| "https://api.smith.langchain.com".to_string()),
            project: env::var("LANGSMITH_PROJECT").unwrap_or_default(),
        };

        Ok(Config {
            llm,
            database,
            logging,
            agent,
            server,
            langsmith,
        })
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            top_k: 5,
            approval_timeout_secs: None,
        }
    }
}
