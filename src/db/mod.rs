//! SQLite access layer for the agent's three introspection/query tools.
//!
//! The database is treated as an external collaborator: a query string
//! goes in, rows or an error description come out. Only the initial
//! connection failure is fatal; everything after startup is surfaced as a
//! [`DatabaseError`] for the tool layer to fold into conversation text.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, DatabaseResult};

/// Number of sample rows included with each table schema.
const SCHEMA_SAMPLE_ROWS: u32 = 3;

/// Handle to the SQLite database backing the agent.
#[derive(Clone, Debug)]
pub struct SqlDatabase {
    pool: SqlitePool,
}

impl SqlDatabase {
    /// Open the configured database file. Fails if the file does not
    /// exist or cannot be opened; this aborts startup.
    pub async fn connect(config: &DatabaseConfig) -> DatabaseResult<Self> {
        if !config.path.exists() {
            return Err(DatabaseError::Connection {
                message: format!("database file not found: {}", config.path.display()),
            });
        }

        let database_url = format!("sqlite://{}", config.path.display());

        let options =
            SqliteConnectOptions::from_str(&database_url).map_err(|e| DatabaseError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        info!(path = %config.path.display(), "Connected to SQLite database");

        Ok(Self { pool })
    }

    /// Open a fresh in-memory database. Used by tests and fixtures; a
    /// single connection keeps the database alive and visible.
    pub async fn open_in_memory() -> DatabaseResult<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                DatabaseError::Connection {
                    message: format!("Invalid database URL: {}", e),
                }
            })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        Ok(Self { pool })
    }

    /// SQL dialect name, used in prompt construction.
    pub fn dialect(&self) -> &'static str {
        "sqlite"
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Names of all user tables, sorted.
    pub async fn list_tables(&self) -> DatabaseResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    /// DDL plus a few sample rows for each named table. An unknown name
    /// fails the whole lookup with [`DatabaseError::TableNotFound`].
    pub async fn table_info(&self, tables: &[String]) -> DatabaseResult<String> {
        let mut sections = Vec::with_capacity(tables.len());

        for name in tables {
            let ddl: Option<String> = sqlx::query_scalar(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

            let ddl = ddl.ok_or_else(|| DatabaseError::TableNotFound { name: name.clone() })?;

            let sample_query = format!(
                "SELECT * FROM \"{}\" LIMIT {}",
                name.replace('"', "\"\""),
                SCHEMA_SAMPLE_ROWS
            );
            let rows = sqlx::query(&sample_query).fetch_all(&self.pool).await?;
            let sample: Vec<String> = rows.iter().map(render_row).collect();

            sections.push(format!(
                "{}\n\n/*\n{} rows from {} table:\n{}\n*/",
                ddl,
                sample.len(),
                name,
                sample.join("\n")
            ));
        }

        Ok(sections.join("\n\n"))
    }

    /// Execute an arbitrary query and render the result rows as text.
    pub async fn run_query(&self, query: &str) -> DatabaseResult<String> {
        debug!(query = %query, "Executing SQL query");

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::Query {
                message: e.to_string(),
            })?;

        if rows.is_empty() {
            return Ok(String::new());
        }

        let rendered: Vec<String> = rows.iter().map(render_row).collect();
        Ok(format!("[{}]", rendered.join(", ")))
    }
}

/// Render one row as a parenthesized value tuple.
fn render_row(row: &SqliteRow) -> String {
    let values: Vec<String> = (0..row.len()).map(|i| render_value(row, i)).collect();
    format!("({})", values.join(", "))
}

/// Render a single column value. SQLite values are dynamically typed, so
/// decoding is attempted from narrowest to widest.
fn render_value(row: &SqliteRow, idx: usize) -> String {
    if let Ok(value) = row.try_get::<Option<i64>, _>(idx) {
        return match value {
            Some(n) => n.to_string(),
            None => "NULL".to_string(),
        };
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(idx) {
        return match value {
            Some(n) => n.to_string(),
            None => "NULL".to_string(),
        };
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(idx) {
        return match value {
            Some(s) => format!("'{}'", s),
            None => "NULL".to_string(),
        };
    }
    if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return match value {
            Some(bytes) => format!("<{} byte blob>", bytes.len()),
            None => "NULL".to_string(),
        };
    }
    "?".to_string()
}
