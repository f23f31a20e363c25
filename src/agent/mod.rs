//! The agent state machine and its human-in-the-loop gate.
//!
//! This module is the heart of the crate: a fixed graph of named nodes
//! (`list_tables → call_get_schema → get_schema → generate_query →
//! check_query → run_query`, with a conditional edge after query
//! generation and a loop back from query execution), plus the suspension
//! point that keeps generated SQL from running without review.

mod approval;
mod graph;

pub use approval::{
    ApprovalMode, ApprovalResolution, PendingApproval, PendingApprovals, SuspendedRun,
    TakenApproval,
};
pub use graph::{AgentOutcome, Node, RunState, SqlAgent};
