//! HTTP query service facade.
//!
//! This module provides:
//! - The axum router and request handlers
//! - Shared application state
//! - The service-side pending-approval bookkeeping
//!
//! The service holds one interactive agent (approval required). A query
//! either completes, or parks at the approval gate and is finished later
//! through the approvals endpoint. Evaluation agents never pass through
//! here.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::agent::{
    AgentOutcome, ApprovalResolution, PendingApprovals, SqlAgent, TakenApproval,
};
use crate::db::SqlDatabase;

/// Application state shared across handlers.
pub struct ServiceState {
    /// Database handle for the introspection endpoint.
    pub db: SqlDatabase,
    /// The interactive agent.
    pub agent: Arc<SqlAgent>,
    /// Runs suspended at the approval gate.
    pub approvals: PendingApprovals,
}

/// Shared application state handle
pub type SharedState = Arc<ServiceState>;

/// Build the service router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tables", get(tables))
        .route("/query", post(query))
        .route("/approvals/{id}", post(resolve_approval))
        .with_state(state)
}

/// Request body for `POST /query`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// The natural-language question.
    pub question: String,
}

/// Response body for a completed `POST /query`.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The agent's final answer.
    pub answer: String,
}

/// Response body when a run suspends for approval.
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingApprovalResponse {
    /// Identifier to pass to the approvals endpoint.
    pub approval_id: Uuid,
    /// The tool awaiting approval.
    pub tool: String,
    /// The proposed query text.
    pub query: String,
    /// Human-readable description of the pause.
    pub description: String,
}

/// Health check endpoint.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// List available database tables.
pub async fn tables(State(state): State<SharedState>) -> Response {
    info!("GET /tables");
    match state.db.list_tables().await {
        Ok(tables) => {
            info!(count = tables.len(), "GET /tables succeeded");
            Json(json!({ "tables": tables })).into_response()
        }
        Err(e) => {
            error!(error = %e, "GET /tables failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// Submit a natural language question and get an answer from the
/// database, or a pending approval to resolve.
pub async fn query(
    State(state): State<SharedState>,
    Json(request): Json<QueryRequest>,
) -> Response {
    if request.question.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "question must not be empty");
    }

    info!(question = %request.question, "POST /query");
    let start = Instant::now();

    let outcome = match state.agent.run(&request.question).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, elapsed_ms = start.elapsed().as_millis(), "POST /query failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let response = outcome_response(&state, outcome);
    info!(elapsed_ms = start.elapsed().as_millis(), "POST /query completed");
    response
}

/// Resolve a pending approval: approve, approve with an edited query, or
/// reject with a reason. The body is the resolution itself.
pub async fn resolve_approval(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(resolution): Json<ApprovalResolution>,
) -> Response {
    info!(approval_id = %id, "POST /approvals");

    let (suspended, resolution) = match state.approvals.take(&id) {
        Ok(TakenApproval::Live(run)) => (run, resolution),
        Ok(TakenApproval::Expired(run)) => {
            info!(approval_id = %id, "Approval expired; resolving as rejection");
            (
                run,
                ApprovalResolution::Reject {
                    reason: Some("approval timed out".to_string()),
                },
            )
        }
        Err(e) => return error_response(StatusCode::CONFLICT, e.to_string()),
    };

    match state.agent.resume(suspended, resolution).await {
        Ok(outcome) => outcome_response(&state, outcome),
        Err(e) => {
            error!(error = %e, approval_id = %id, "Resuming run failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Map an agent outcome to an HTTP response, parking suspended runs in
/// the approvals store.
fn outcome_response(state: &ServiceState, outcome: AgentOutcome) -> Response {
    match outcome {
        AgentOutcome::Complete(run) => {
            if run.conversation.is_empty() {
                error!("Agent returned no messages");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Agent returned no messages",
                );
            }
            let answer = run
                .final_answer()
                .unwrap_or("No answer generated.")
                .to_string();
            Json(QueryResponse { answer }).into_response()
        }
        AgentOutcome::AwaitingApproval(suspended) => {
            let body = PendingApprovalResponse {
                approval_id: suspended.pending.id,
                tool: suspended.pending.call.name.to_string(),
                query: suspended.pending.query(),
                description: suspended.pending.description.clone(),
            };
            state.approvals.insert(suspended);
            (StatusCode::ACCEPTED, Json(body)).into_response()
        }
    }
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_handler() {
        let body = health().await;
        assert_eq!(body.0["status"], "ok");
    }
}
