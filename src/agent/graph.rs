use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::approval::{ApprovalMode, ApprovalResolution, PendingApproval, SuspendedRun};
use crate::config::AgentConfig;
use crate::conversation::{Conversation, Message, ToolCall};
use crate::error::{AgentError, AgentResult};
use crate::llm::{ChatModel, ChatRequest, ToolChoice};
use crate::prompts;
use crate::tools::{RunQueryArgs, ToolName, ToolRegistry, write_statement_verb};

/// Call id of the synthetic list-tables invocation issued by the first
/// node without model involvement.
const LIST_TABLES_CALL_ID: &str = "list_tables_call";

/// A named step of the agent state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// Unconditionally list the database tables.
    ListTables,
    /// Force the model to choose which schemas to fetch.
    CallGetSchema,
    /// Execute the requested schema fetches.
    GetSchema,
    /// Generate a query, or a final text answer on later passes.
    GenerateQuery,
    /// Review the proposed query for common mistakes.
    CheckQuery,
    /// Execute the reviewed query, gated by approval.
    RunQuery,
    /// Terminal: the last assistant text is the answer.
    End,
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Node::ListTables => "list_tables",
            Node::CallGetSchema => "call_get_schema",
            Node::GetSchema => "get_schema",
            Node::GenerateQuery => "generate_query",
            Node::CheckQuery => "check_query",
            Node::RunQuery => "run_query",
            Node::End => "end",
        };
        f.write_str(name)
    }
}

/// The complete, serializable state of one run: the conversation log and
/// the loop counter. This is what gets checkpointed when the run suspends
/// at the approval gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Message log owned by this run.
    pub conversation: Conversation,
    /// Number of entries into the query-generation node so far.
    pub iterations: u32,
}

impl RunState {
    /// Start a run from a user question.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            conversation: Conversation::with_question(question),
            iterations: 0,
        }
    }

    /// The final answer text, if the run has produced one.
    pub fn final_answer(&self) -> Option<&str> {
        self.conversation.final_answer()
    }
}

/// Result of driving a run as far as it can go.
#[derive(Debug)]
pub enum AgentOutcome {
    /// The run reached the terminal node.
    Complete(RunState),
    /// The run is suspended at the approval gate.
    AwaitingApproval(SuspendedRun),
}

/// The natural-language-to-SQL agent.
///
/// Owns nothing mutable: each run threads its own [`RunState`] through
/// the node methods, so independent runs can share one agent.
pub struct SqlAgent {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    approval: ApprovalMode,
    max_iterations: u32,
    top_k: u32,
}

impl SqlAgent {
    /// Create an agent. `approval` is fixed for the agent's lifetime;
    /// interactive and evaluation agents are distinct instances.
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: ToolRegistry,
        approval: ApprovalMode,
        config: &AgentConfig,
    ) -> Self {
        Self {
            model,
            tools,
            approval,
            max_iterations: config.max_iterations,
            top_k: config.top_k,
        }
    }

    /// The approval mode this agent was constructed with.
    pub fn approval_mode(&self) -> ApprovalMode {
        self.approval
    }

    /// Run the graph from the start for a new question, until it either
    /// terminates or suspends for approval.
    pub async fn run(&self, question: &str) -> AgentResult<AgentOutcome> {
        info!(question = %truncate(question, 100), "Starting agent run");
        let state = RunState::new(question);
        self.advance(state, Node::ListTables).await
    }

    /// Resume a run suspended at the approval gate.
    pub async fn resume(
        &self,
        suspended: SuspendedRun,
        resolution: ApprovalResolution,
    ) -> AgentResult<AgentOutcome> {
        let SuspendedRun { mut state, pending } = suspended;

        match resolution {
            ApprovalResolution::Approve => {
                info!(approval_id = %pending.id, "Approval granted; executing query");
                self.execute_query_call(&mut state.conversation, &pending.call)
                    .await;
            }
            ApprovalResolution::ApproveWithEdit { query } => {
                info!(approval_id = %pending.id, "Approval granted with edited query");
                let call = ToolCall::new(
                    pending.call.id.clone(),
                    pending.call.name,
                    serde_json::json!({ "query": query }),
                );
                self.execute_query_call(&mut state.conversation, &call).await;
            }
            ApprovalResolution::Reject { reason } => {
                let reason = reason.unwrap_or_else(|| "no reason given".to_string());
                info!(approval_id = %pending.id, %reason, "Approval rejected");
                state.conversation.push(Message::tool_error(
                    &pending.call.id,
                    format!("Query execution rejected by reviewer: {}", reason),
                ));
            }
        }

        self.advance(state, Node::GenerateQuery).await
    }

    /// Conditional edge after query generation: a tool-call request means
    /// the query must be checked; a plain text reply ends the run.
    pub fn should_continue(conversation: &Conversation) -> Node {
        if conversation.last_tool_calls().is_empty() {
            Node::End
        } else {
            Node::CheckQuery
        }
    }

    /// Drive the graph from `node` until a terminal or suspension point.
    async fn advance(&self, mut state: RunState, mut node: Node) -> AgentResult<AgentOutcome> {
        loop {
            debug!(node = %node, messages = state.conversation.len(), "Entering node");
            node = match node {
                Node::ListTables => {
                    self.list_tables(&mut state.conversation).await;
                    Node::CallGetSchema
                }
                Node::CallGetSchema => {
                    self.call_get_schema(&mut state.conversation).await?;
                    Node::GetSchema
                }
                Node::GetSchema => {
                    self.get_schema(&mut state.conversation).await;
                    Node::GenerateQuery
                }
                Node::GenerateQuery => {
                    state.iterations += 1;
                    if state.iterations > self.max_iterations {
                        warn!(
                            iterations = state.iterations,
                            max = self.max_iterations,
                            "Iteration guard hit; forcing termination"
                        );
                        state
                            .conversation
                            .push(Message::assistant(prompts::INCONCLUSIVE_ANSWER));
                        Node::End
                    } else {
                        self.generate_query(&mut state.conversation).await?;
                        Self::should_continue(&state.conversation)
                    }
                }
                Node::CheckQuery => {
                    self.check_query(&mut state.conversation).await?;
                    Node::RunQuery
                }
                Node::RunQuery => {
                    let call = state
                        .conversation
                        .last_tool_calls()
                        .first()
                        .cloned()
                        .ok_or_else(|| AgentError::MissingToolCall {
                            node: Node::RunQuery.to_string(),
                        })?;

                    // Refuse non-read-only statements before bothering a
                    // reviewer with them
                    if let Some(verb) = proposed_write_verb(&call) {
                        warn!(verb, "Refusing non-read-only statement before the gate");
                        state.conversation.push(Message::tool_error(
                            &call.id,
                            format!(
                                "Error: {} statements are not permitted; only read-only \
                                 queries may be executed.",
                                verb.to_uppercase()
                            ),
                        ));
                        Node::GenerateQuery
                    } else {
                        match self.approval {
                            ApprovalMode::Auto => {
                                self.execute_query_call(&mut state.conversation, &call).await;
                                Node::GenerateQuery
                            }
                            ApprovalMode::Required => {
                                let pending = PendingApproval::new(&call);
                                info!(
                                    approval_id = %pending.id,
                                    query = %pending.query(),
                                    "Suspending run for query approval"
                                );
                                return Ok(AgentOutcome::AwaitingApproval(SuspendedRun {
                                    state,
                                    pending,
                                }));
                            }
                        }
                    }
                }
                Node::End => {
                    info!(
                        messages = state.conversation.len(),
                        iterations = state.iterations,
                        "Agent run complete"
                    );
                    return Ok(AgentOutcome::Complete(state));
                }
            };
        }
    }

    /// Step 1: list tables without any model reasoning.
    async fn list_tables(&self, conversation: &mut Conversation) {
        let call = ToolCall::new(
            LIST_TABLES_CALL_ID,
            ToolName::ListTables,
            serde_json::json!({}),
        );
        conversation.push(Message::assistant_tool_calls("", vec![call.clone()]));

        let result = self.tools.execute(&call).await;
        let tables = result.content().to_string();
        conversation.push(result);

        conversation.push(Message::assistant(format!("Available tables: {}", tables)));
    }

    /// Step 2: the model must choose which table schemas to fetch.
    async fn call_get_schema(&self, conversation: &mut Conversation) -> AgentResult<()> {
        let request = ChatRequest {
            messages: conversation.messages().to_vec(),
            tools: vec![self.tools.definition(ToolName::GetSchema)],
            tool_choice: ToolChoice::Required,
        };

        let completion = self.model.chat(request).await?;
        if completion.tool_calls.is_empty() {
            return Err(AgentError::MissingToolCall {
                node: Node::CallGetSchema.to_string(),
            });
        }

        conversation.push(Message::assistant_tool_calls(
            completion.content,
            completion.tool_calls,
        ));
        Ok(())
    }

    /// Step 3: execute the requested schema fetches. Bad table names
    /// surface as error text the model can react to.
    async fn get_schema(&self, conversation: &mut Conversation) {
        let calls: Vec<ToolCall> = conversation.last_tool_calls().to_vec();
        for call in &calls {
            let result = self.tools.execute(call).await;
            conversation.push(result);
        }
    }

    /// Step 4: generate a query under the operating policy, or answer in
    /// text when no further querying is needed.
    async fn generate_query(&self, conversation: &mut Conversation) -> AgentResult<()> {
        let system = Message::system(prompts::generate_query_prompt(
            self.tools.dialect(),
            self.top_k,
        ));

        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(system);
        messages.extend_from_slice(conversation.messages());

        let request = ChatRequest {
            messages,
            tools: vec![self.tools.definition(ToolName::RunQuery)],
            tool_choice: ToolChoice::Auto,
        };

        let completion = self.model.chat(request).await?;
        conversation.push(Message::assistant_tool_calls(
            completion.content,
            completion.tool_calls,
        ));
        Ok(())
    }

    /// Step 5: present the proposed query to the model under the reviewer
    /// instruction; the reviewed (possibly corrected) query replaces the
    /// proposal, and the superseded call id is answered so the history
    /// stays consistent.
    async fn check_query(&self, conversation: &mut Conversation) -> AgentResult<()> {
        let proposal = conversation
            .last_tool_calls()
            .first()
            .cloned()
            .ok_or_else(|| AgentError::MissingToolCall {
                node: Node::CheckQuery.to_string(),
            })?;

        let query_text = serde_json::from_value::<RunQueryArgs>(proposal.arguments.clone())
            .map(|args| args.query)
            .unwrap_or_else(|_| proposal.arguments.to_string());

        let request = ChatRequest {
            messages: vec![
                Message::system(prompts::check_query_prompt(self.tools.dialect())),
                Message::user(query_text),
            ],
            tools: vec![self.tools.definition(ToolName::RunQuery)],
            tool_choice: ToolChoice::Required,
        };

        let completion = self.model.chat(request).await?;
        if completion.tool_calls.is_empty() {
            return Err(AgentError::MissingToolCall {
                node: Node::CheckQuery.to_string(),
            });
        }

        conversation.push(Message::tool_result(
            &proposal.id,
            "Superseded by the reviewed query that follows.",
        ));
        conversation.push(Message::assistant_tool_calls(
            completion.content,
            completion.tool_calls,
        ));
        Ok(())
    }

    /// Step 6: execute an approved query and append its result. The
    /// registry folds execution failures into error text, so this cannot
    /// fail the run.
    async fn execute_query_call(&self, conversation: &mut Conversation, call: &ToolCall) {
        let result = self.tools.execute(call).await;
        conversation.push(result);
    }
}

/// The write verb of a proposed run_query call, if its statement is not
/// read-only.
fn proposed_write_verb(call: &ToolCall) -> Option<&'static str> {
    serde_json::from_value::<RunQueryArgs>(call.arguments.clone())
        .ok()
        .and_then(|args| write_statement_verb(&args.query))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_should_continue_is_deterministic() {
        let mut conversation = Conversation::new();
        conversation.push(Message::assistant("The genres are Rock, Jazz and Metal."));
        assert_eq!(SqlAgent::should_continue(&conversation), Node::End);

        conversation.push(Message::assistant_tool_calls(
            "",
            vec![ToolCall::new(
                "c1",
                ToolName::RunQuery,
                json!({"query": "SELECT 1"}),
            )],
        ));
        assert_eq!(SqlAgent::should_continue(&conversation), Node::CheckQuery);
    }

    #[test]
    fn test_run_state_serialization_round_trip() {
        let mut state = RunState::new("What are all the genres?");
        state.iterations = 2;
        state
            .conversation
            .push(Message::assistant("Available tables: Genre"));

        let encoded = serde_json::to_string(&state).unwrap();
        let decoded: RunState = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.iterations, 2);
        assert_eq!(
            decoded.final_answer(),
            Some("Available tables: Genre")
        );
    }

    #[test]
    fn test_node_display_names() {
        assert_eq!(Node::ListTables.to_string(), "list_tables");
        assert_eq!(Node::CallGetSchema.to_string(), "call_get_schema");
        assert_eq!(Node::GenerateQuery.to_string(), "generate_query");
        assert_eq!(Node::End.to_string(), "end");
    }

    #[test]
    fn test_proposed_write_verb() {
        let dml = ToolCall::new("c", ToolName::RunQuery, json!({"query": "DELETE FROM t"}));
        assert_eq!(proposed_write_verb(&dml), Some("delete"));

        let select = ToolCall::new("c", ToolName::RunQuery, json!({"query": "SELECT 1"}));
        assert_eq!(proposed_write_verb(&select), None);

        let malformed = ToolCall::new("c", ToolName::RunQuery, json!({"sql": "DELETE FROM t"}));
        assert_eq!(proposed_write_verb(&malformed), None);
    }

    #[test]
    fn test_truncate_preserves_short_text() {
        assert_eq!(truncate("short", 10), "short");
        let long = "x".repeat(120);
        let cut = truncate(&long, 100);
        assert_eq!(cut.chars().count(), 101);
        assert!(cut.ends_with('…'));
    }
}
