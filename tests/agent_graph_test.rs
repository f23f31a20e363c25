//! End-to-end tests of the agent graph over a scripted model.

mod common;

use common::{build_agent, build_agent_with_max_iterations, chinook_mini, ScriptStep, ScriptedModel};
use serde_json::json;

use sql_agent::agent::{AgentOutcome, ApprovalMode, Node, SqlAgent};
use sql_agent::conversation::{Conversation, Message};
use sql_agent::error::AgentError;
use sql_agent::llm::ToolChoice;
use sql_agent::prompts;
use sql_agent::tools::ToolName;

fn assert_complete(outcome: AgentOutcome) -> sql_agent::agent::RunState {
    match outcome {
        AgentOutcome::Complete(state) => state,
        AgentOutcome::AwaitingApproval(_) => panic!("run unexpectedly suspended"),
    }
}

#[tokio::test]
async fn test_happy_path_answers_from_query_results() {
    let model = ScriptedModel::new(vec![
        ScriptStep::Call(ToolName::GetSchema, json!({"table_names": ["Genre"]})),
        ScriptStep::Call(
            ToolName::RunQuery,
            json!({"query": "SELECT Name FROM Genre LIMIT 5"}),
        ),
        ScriptStep::Call(
            ToolName::RunQuery,
            json!({"query": "SELECT Name FROM Genre LIMIT 5"}),
        ),
        ScriptStep::Text("The genres are Rock, Jazz and Metal."),
    ]);
    let agent = build_agent(model.clone(), chinook_mini().await, ApprovalMode::Auto).await;

    let state = assert_complete(agent.run("What are all the genres?").await.unwrap());
    let answer = state.final_answer().unwrap();
    assert!(answer.contains("Rock"));
    assert!(answer.contains("Jazz"));
    assert!(answer.contains("Metal"));

    // The query result that grounded the answer is in the log
    let grounded = state
        .conversation
        .messages()
        .iter()
        .any(|m| matches!(m, Message::Tool { content, .. } if content.contains("'Rock'")));
    assert!(grounded, "expected a tool result carrying query rows");

    // Every tool call was answered, including the superseded proposal
    assert!(state.conversation.unanswered_calls().is_empty());
}

#[tokio::test]
async fn test_list_tables_runs_first_and_schema_precedes_generation() {
    let model = ScriptedModel::new(vec![
        ScriptStep::Call(ToolName::GetSchema, json!({"table_names": ["Genre"]})),
        ScriptStep::Text("Done without querying."),
    ]);
    let agent = build_agent(model.clone(), chinook_mini().await, ApprovalMode::Auto).await;

    let state = assert_complete(agent.run("Anything in there?").await.unwrap());
    let messages = state.conversation.messages();

    // First message is the question, then the unconditional list_tables
    // invocation, its result, and the summary
    assert!(matches!(messages[0], Message::User { .. }));
    assert_eq!(messages[1].tool_calls()[0].name, ToolName::ListTables);
    assert!(matches!(messages[2], Message::Tool { .. }));
    assert!(messages[3].content().starts_with("Available tables:"));
    assert!(messages[3].content().contains("Genre"));

    // The schema fetch happened before any generation request
    let requests = model.requests();
    assert_eq!(requests[0].tools[0].name, ToolName::GetSchema);
    assert_eq!(requests[0].tool_choice, ToolChoice::Required);
}

#[tokio::test]
async fn test_generation_request_carries_policy_and_run_query_tool() {
    let model = ScriptedModel::new(vec![
        ScriptStep::Call(ToolName::GetSchema, json!({"table_names": ["Genre"]})),
        ScriptStep::Text("No query needed."),
    ]);
    let agent = build_agent(model.clone(), chinook_mini().await, ApprovalMode::Auto).await;
    assert_complete(agent.run("hello").await.unwrap());

    let requests = model.requests();
    let generation = &requests[1];
    assert_eq!(generation.tools.len(), 1);
    assert_eq!(generation.tools[0].name, ToolName::RunQuery);
    assert_eq!(generation.tool_choice, ToolChoice::Auto);

    // Policy prompt is prepended as the system message
    match &generation.messages[0] {
        Message::System { content } => {
            assert!(content.contains("DO NOT make any DML statements"));
            assert!(content.contains("at most 5 results"));
        }
        other => panic!("expected system message, got {:?}", other),
    }
}

#[tokio::test]
async fn test_check_query_reviews_only_the_proposed_query() {
    let model = ScriptedModel::new(vec![
        ScriptStep::Call(ToolName::GetSchema, json!({"table_names": ["Genre"]})),
        ScriptStep::Call(
            ToolName::RunQuery,
            json!({"query": "SELECT Name FROM Genre LIMIT 5"}),
        ),
        ScriptStep::Call(
            ToolName::RunQuery,
            json!({"query": "SELECT Name FROM Genre LIMIT 5"}),
        ),
        ScriptStep::Text("done"),
    ]);
    let agent = build_agent(model.clone(), chinook_mini().await, ApprovalMode::Auto).await;
    assert_complete(agent.run("genres?").await.unwrap());

    let requests = model.requests();
    let review = &requests[2];
    // The reviewer sees its own instruction plus the bare query text
    assert_eq!(review.messages.len(), 2);
    assert!(review.messages[0]
        .content()
        .contains("SQL expert with a strong attention to detail"));
    assert_eq!(review.messages[1].content(), "SELECT Name FROM Genre LIMIT 5");
    assert_eq!(review.tool_choice, ToolChoice::Required);
}

#[tokio::test]
async fn test_unknown_table_schema_error_does_not_crash_run() {
    let model = ScriptedModel::new(vec![
        ScriptStep::Call(ToolName::GetSchema, json!({"table_names": ["Nonexistent"]})),
        ScriptStep::Text("That table does not exist."),
    ]);
    let agent = build_agent(model.clone(), chinook_mini().await, ApprovalMode::Auto).await;

    let state = assert_complete(agent.run("describe Nonexistent").await.unwrap());
    let error_result = state
        .conversation
        .messages()
        .iter()
        .find(|m| matches!(m, Message::Tool { is_error: true, .. }))
        .expect("expected an error tool result");
    assert!(error_result.content().contains("Nonexistent"));
    assert!(error_result.content().contains("not found"));
}

#[tokio::test]
async fn test_iteration_guard_forces_inconclusive_answer() {
    // The model never stops proposing queries; two generation passes are
    // allowed, each followed by a review pass
    let model = ScriptedModel::new(vec![
        ScriptStep::Call(ToolName::GetSchema, json!({"table_names": ["Genre"]})),
        ScriptStep::Call(ToolName::RunQuery, json!({"query": "SELECT 1"})),
        ScriptStep::Call(ToolName::RunQuery, json!({"query": "SELECT 1"})),
        ScriptStep::Call(ToolName::RunQuery, json!({"query": "SELECT 2"})),
        ScriptStep::Call(ToolName::RunQuery, json!({"query": "SELECT 2"})),
    ]);
    let agent = build_agent_with_max_iterations(
        model.clone(),
        chinook_mini().await,
        ApprovalMode::Auto,
        2,
    )
    .await;

    let state = assert_complete(agent.run("loop forever").await.unwrap());
    assert_eq!(state.final_answer(), Some(prompts::INCONCLUSIVE_ANSWER));
    assert_eq!(state.iterations, 3);
}

#[tokio::test]
async fn test_dml_is_refused_before_execution() {
    let model = ScriptedModel::new(vec![
        ScriptStep::Call(ToolName::GetSchema, json!({"table_names": ["Genre"]})),
        ScriptStep::Call(ToolName::RunQuery, json!({"query": "DROP TABLE Genre"})),
        ScriptStep::Call(ToolName::RunQuery, json!({"query": "DROP TABLE Genre"})),
        ScriptStep::Text("I cannot modify the database."),
    ]);
    let db = chinook_mini().await;
    let agent = build_agent(model.clone(), db.clone(), ApprovalMode::Auto).await;

    let state = assert_complete(agent.run("drop the genres table").await.unwrap());

    let refusal = state
        .conversation
        .messages()
        .iter()
        .find(|m| matches!(m, Message::Tool { is_error: true, .. }))
        .expect("expected a refusal tool result");
    assert!(refusal.content().contains("not permitted"));

    // The table survived
    assert!(db.list_tables().await.unwrap().contains(&"Genre".to_string()));
}

#[tokio::test]
async fn test_text_only_reply_at_forced_schema_node_is_hard_error() {
    let model = ScriptedModel::new(vec![ScriptStep::Text("I refuse to pick a table.")]);
    let agent = build_agent(model.clone(), chinook_mini().await, ApprovalMode::Auto).await;

    let err = agent.run("genres?").await.unwrap_err();
    match err {
        AgentError::MissingToolCall { node } => assert_eq!(node, "call_get_schema"),
        other => panic!("expected MissingToolCall, got {:?}", other),
    }
}

#[test]
fn test_conditional_edge_is_deterministic() {
    let mut conversation = Conversation::new();
    conversation.push(Message::assistant("final answer"));
    assert_eq!(SqlAgent::should_continue(&conversation), Node::End);

    conversation.push(Message::assistant_tool_calls(
        "",
        vec![sql_agent::conversation::ToolCall::new(
            "c1",
            ToolName::RunQuery,
            json!({"query": "SELECT 1"}),
        )],
    ));
    assert_eq!(SqlAgent::should_continue(&conversation), Node::CheckQuery);
}
