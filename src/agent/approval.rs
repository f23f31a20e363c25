use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::graph::RunState;
use crate::conversation::ToolCall;
use crate::error::{ApprovalError, ApprovalResult};
use crate::tools::RunQueryArgs;

/// Whether the agent suspends for review before executing a query.
///
/// Chosen at construction time: interactive agents gate, evaluation
/// agents auto-approve. The two are structurally distinct instances
/// sharing every other node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Suspend before every query execution and wait for a resolution.
    Required,
    /// Execute every proposed query immediately. Evaluation only.
    Auto,
}

/// A query execution waiting for review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApproval {
    /// Unique approval identifier.
    pub id: Uuid,
    /// The proposed tool invocation, exactly as the model requested it.
    pub call: ToolCall,
    /// Free-text description surfaced to the reviewer.
    pub description: String,
    /// When the run suspended.
    pub created_at: DateTime<Utc>,
}

impl PendingApproval {
    /// Create a pending approval for a proposed tool call.
    pub fn new(call: &ToolCall) -> Self {
        Self {
            id: Uuid::new_v4(),
            call: call.clone(),
            description: "Tool execution pending approval".to_string(),
            created_at: Utc::now(),
        }
    }

    /// The proposed query text, or the raw argument payload when the
    /// arguments do not decode.
    pub fn query(&self) -> String {
        serde_json::from_value::<RunQueryArgs>(self.call.arguments.clone())
            .map(|args| args.query)
            .unwrap_or_else(|_| self.call.arguments.to_string())
    }
}

/// A run suspended at the approval gate: the full serializable state plus
/// the proposal under review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendedRun {
    /// Checkpointed run state.
    pub state: RunState,
    /// The proposal awaiting resolution.
    pub pending: PendingApproval,
}

/// How a pending approval was resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalResolution {
    /// Run exactly the proposed arguments.
    Approve,
    /// Run a caller-substituted query instead of the proposed one.
    ApproveWithEdit {
        /// Replacement query text.
        query: String,
    },
    /// Do not run the tool; feed a rejection back to the model.
    Reject {
        /// Optional reviewer-supplied reason.
        reason: Option<String>,
    },
}

/// Outcome of claiming a pending approval from the store.
#[derive(Debug)]
pub enum TakenApproval {
    /// The approval is live and may be resolved as requested.
    Live(SuspendedRun),
    /// The approval outlived the configured timeout; it must be resolved
    /// as a rejection regardless of the requested decision.
    Expired(SuspendedRun),
}

/// Store of suspended runs keyed by approval id.
///
/// Resolution is claim-based: `take` removes the entry, so a second
/// resolution attempt for the same id fails with a typed error instead of
/// silently re-running the query.
pub struct PendingApprovals {
    inner: Mutex<HashMap<Uuid, SuspendedRun>>,
    timeout: Option<Duration>,
}

impl PendingApprovals {
    /// Create a store. `timeout` bounds how long an approval may stay
    /// pending; `None` disables expiry.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Park a suspended run and return its approval id.
    pub fn insert(&self, run: SuspendedRun) -> Uuid {
        let id = run.pending.id;
        self.inner
            .lock()
            .expect("pending approvals lock poisoned")
            .insert(id, run);
        id
    }

    /// Claim a pending approval for resolution, removing it from the
    /// store.
    pub fn take(&self, id: &Uuid) -> ApprovalResult<TakenApproval> {
        let run = self
            .inner
            .lock()
            .expect("pending approvals lock poisoned")
            .remove(id)
            .ok_or(ApprovalError::AlreadyResolved { id: *id })?;

        if let Some(timeout) = self.timeout {
            let age = Utc::now().signed_duration_since(run.pending.created_at);
            if age.num_seconds() >= 0 && age.num_seconds() as u64 >= timeout.as_secs() {
                return Ok(TakenApproval::Expired(run));
            }
        }

        Ok(TakenApproval::Live(run))
    }

    /// Number of approvals currently pending.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("pending approvals lock poisoned")
            .len()
    }

    /// Whether no approvals are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
