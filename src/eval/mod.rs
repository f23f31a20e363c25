//! Batch evaluation harness.
//!
//! Exercises the agent end-to-end against a fixed corpus and scores
//! answers by case-insensitive substring matching. Runs are independent
//! conversations executed with bounded concurrency; a run whose failure
//! looks like a transient response-parsing problem is retried exactly
//! once. None of this applies to the interactive graph.

mod cases;

pub use cases::{filter_by_category, TestCase, TEST_CASES};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

use crate::agent::{AgentOutcome, SqlAgent};
use crate::error::{AppError, AppResult};

/// Result of a single test case run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    /// Case identifier.
    pub test_id: String,
    /// The question that was asked.
    pub question: String,
    /// Whether the case passed overall.
    pub passed: bool,
    /// Whether the answer contained every expected substring.
    pub answer_correct: bool,
    /// The agent's final answer, when a run completed.
    pub agent_response: Option<String>,
    /// Error text, when a run failed.
    pub error: Option<String>,
    /// Debug tag distinguishing failure classes (e.g. `json_parse`).
    pub error_debug: Option<String>,
    /// Wall-clock latency of the run, including any retry.
    pub latency_ms: f64,
}

/// Pass/total counts for one category.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CategoryStats {
    /// Cases run in this category.
    pub total: usize,
    /// Cases passed in this category.
    pub passed: usize,
}

/// Aggregated metrics across all test runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalSummary {
    /// Total cases run.
    pub total: usize,
    /// Cases passed.
    pub passed: usize,
    /// Cases failed.
    pub failed: usize,
    /// Fraction of cases with a correct answer.
    pub answer_accuracy: f64,
    /// Mean latency across cases.
    pub avg_latency_ms: f64,
    /// Per-category breakdown.
    pub by_category: BTreeMap<String, CategoryStats>,
}

/// Exported evaluation document.
#[derive(Debug, Serialize, Deserialize)]
pub struct EvalExport {
    /// When the export was written (RFC 3339).
    pub timestamp: String,
    /// Headline counts.
    pub summary: ExportSummary,
    /// Per-case results.
    pub results: Vec<EvalResult>,
}

/// Headline counts of an export.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportSummary {
    /// Total cases.
    pub total: usize,
    /// Cases passed.
    pub passed: usize,
    /// Cases failed.
    pub failed: usize,
}

impl EvalExport {
    /// Read a previously written export.
    pub fn read(path: impl AsRef<Path>) -> AppResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| AppError::Internal {
            message: format!("failed to read eval export: {}", e),
        })?;
        serde_json::from_str(&text).map_err(|e| AppError::Internal {
            message: format!("failed to decode eval export: {}", e),
        })
    }
}

/// True if the error text looks like a transient JSON/parsing failure.
pub fn is_parse_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("object key string") || message.contains("json")
}

/// True if the response contains all expected values (case-insensitive).
pub fn check_answer_contains(response: &str, expected: &[&str]) -> bool {
    if response.is_empty() {
        return false;
    }
    let response = response.to_lowercase();
    expected
        .iter()
        .all(|value| response.contains(&value.to_lowercase()))
}

/// Evaluates the agent against a set of test cases.
pub struct Evaluator {
    agent: Arc<SqlAgent>,
}

impl Evaluator {
    /// Create an evaluator. The agent must auto-approve queries; a
    /// suspension during evaluation is recorded as a failure.
    pub fn new(agent: Arc<SqlAgent>) -> Self {
        Self { agent }
    }

    /// Run a single test case. Retries once when the failure looks like a
    /// transient parse error.
    pub async fn run_single(&self, case: &TestCase) -> EvalResult {
        Self::run_case(Arc::clone(&self.agent), case).await
    }

    async fn run_case(agent: Arc<SqlAgent>, case: &TestCase) -> EvalResult {
        let mut result = EvalResult {
            test_id: case.id.to_string(),
            question: case.question.to_string(),
            passed: false,
            answer_correct: false,
            agent_response: None,
            error: None,
            error_debug: None,
            latency_ms: 0.0,
        };

        let start = Instant::now();
        for attempt in 0..2 {
            match agent.run(case.question).await {
                Ok(AgentOutcome::Complete(run)) => {
                    result.latency_ms = elapsed_ms(start);
                    let response = run.final_answer().unwrap_or_default().to_string();
                    result.answer_correct = if case.expected_answer_contains.is_empty() {
                        true
                    } else {
                        check_answer_contains(&response, case.expected_answer_contains)
                    };
                    result.agent_response = Some(response);
                    result.passed = result.answer_correct;
                    return result;
                }
                Ok(AgentOutcome::AwaitingApproval(_)) => {
                    result.latency_ms = elapsed_ms(start);
                    result.error =
                        Some("run suspended awaiting approval during evaluation".to_string());
                    return result;
                }
                Err(e) => {
                    result.latency_ms = elapsed_ms(start);
                    let message = e.to_string();
                    let parse_error = is_parse_error(&message);
                    result.error = Some(message);
                    if parse_error {
                        result.error_debug = Some("json_parse".to_string());
                        if attempt == 0 {
                            continue;
                        }
                    }
                    break;
                }
            }
        }

        result
    }

    /// Run all cases with bounded concurrency and return results in case
    /// order together with the computed summary.
    pub async fn run_all(
        &self,
        cases: &[TestCase],
        concurrency: usize,
        verbose: bool,
    ) -> (Vec<EvalResult>, EvalSummary) {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for (index, case) in cases.iter().copied().enumerate() {
            let agent = Arc::clone(&self.agent);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                let result = Self::run_case(agent, &case).await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<EvalResult>> = vec![None; cases.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if verbose {
                        let status = if result.passed { "PASS" } else { "FAIL" };
                        println!(
                            "  [{}] {}: {}",
                            status,
                            result.test_id,
                            truncate_question(&result.question)
                        );
                    }
                    slots[index] = Some(result);
                }
                Err(e) => error!(error = %e, "Evaluation task failed to join"),
            }
        }

        let results: Vec<EvalResult> = slots
            .into_iter()
            .map(|slot| slot.expect("evaluation task produced no result"))
            .collect();
        let summary = compute_summary(cases, &results);
        (results, summary)
    }
}

/// Compute evaluation metrics from per-case results.
pub fn compute_summary(cases: &[TestCase], results: &[EvalResult]) -> EvalSummary {
    let mut summary = EvalSummary {
        total: results.len(),
        ..EvalSummary::default()
    };

    let mut answer_correct_count = 0usize;
    let mut total_latency = 0.0f64;

    for (case, result) in cases.iter().zip(results) {
        if result.passed {
            summary.passed += 1;
        } else {
            summary.failed += 1;
        }
        if result.answer_correct {
            answer_correct_count += 1;
        }
        total_latency += result.latency_ms;

        let stats = summary
            .by_category
            .entry(case.category.to_string())
            .or_default();
        stats.total += 1;
        if result.passed {
            stats.passed += 1;
        }
    }

    if summary.total > 0 {
        summary.answer_accuracy = answer_correct_count as f64 / summary.total as f64;
        summary.avg_latency_ms = total_latency / summary.total as f64;
    }

    summary
}

/// Export results to JSON for analysis.
pub fn export_results(results: &[EvalResult], path: impl AsRef<Path>) -> AppResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AppError::Internal {
            message: format!("failed to create export directory: {}", e),
        })?;
    }

    let export = EvalExport {
        timestamp: chrono::Utc::now().to_rfc3339(),
        summary: ExportSummary {
            total: results.len(),
            passed: results.iter().filter(|r| r.passed).count(),
            failed: results.iter().filter(|r| !r.passed).count(),
        },
        results: results.to_vec(),
    };

    let text = serde_json::to_string_pretty(&export).map_err(|e| AppError::Internal {
        message: format!("failed to encode eval export: {}", e),
    })?;
    std::fs::write(path, text).map_err(|e| AppError::Internal {
        message: format!("failed to write eval export: {}", e),
    })
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn truncate_question(question: &str) -> String {
    if question.chars().count() > 50 {
        let mut out: String = question.chars().take(50).collect();
        out.push('…');
        out
    } else {
        question.to_string()
    }
}
