//! CLI runner for SQL agent evaluation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use sql_agent::agent::{ApprovalMode, SqlAgent};
use sql_agent::config::Config;
use sql_agent::db::SqlDatabase;
use sql_agent::eval::{export_results, filter_by_category, Evaluator, TEST_CASES};
use sql_agent::llm::build_model;
use sql_agent::tools::ToolRegistry;

/// Run SQL agent evaluation against the Chinook test cases.
#[derive(Debug, Parser)]
#[command(name = "run_eval", version)]
struct Args {
    /// Run only test cases in this category (e.g. aggregation, join,
    /// simple, filter, complex).
    #[arg(long)]
    category: Option<String>,

    /// Output path for JSON results.
    #[arg(short, long, default_value = "eval_results/eval_results.json")]
    output: PathBuf,

    /// Suppress per-test progress output.
    #[arg(short, long)]
    quiet: bool,

    /// Maximum number of concurrent runs.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    sql_agent::logging::init(&config.logging);

    let cases = match &args.category {
        Some(category) => {
            let filtered = filter_by_category(TEST_CASES, category);
            if filtered.is_empty() {
                eprintln!("No test cases found for category: {}", category);
                std::process::exit(1);
            }
            println!("Running {} tests in category: {}", filtered.len(), category);
            filtered
        }
        None => {
            println!("Running all {} tests", TEST_CASES.len());
            TEST_CASES.to_vec()
        }
    };

    println!("{}", "=".repeat(60));
    println!("SQL Agent Evaluation");
    println!("{}", "=".repeat(60));

    let db = SqlDatabase::connect(&config.database).await?;
    let model = build_model(&config.llm)?;

    // Evaluation agent: the approval gate is bypassed entirely
    let agent = Arc::new(SqlAgent::new(
        model,
        ToolRegistry::new(db),
        ApprovalMode::Auto,
        &config.agent,
    ));

    let evaluator = Evaluator::new(agent);
    let (results, summary) = evaluator
        .run_all(&cases, args.concurrency, !args.quiet)
        .await;

    println!("\n{}", "=".repeat(60));
    println!("SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Total tests:      {}", summary.total);
    if summary.total > 0 {
        let pct = summary.passed as f64 / summary.total as f64 * 100.0;
        println!("Passed:           {} ({:.1}%)", summary.passed, pct);
    }
    println!("Failed:           {}", summary.failed);
    println!("Answer accuracy:  {:.1}%", summary.answer_accuracy * 100.0);
    println!("Avg latency:      {:.0} ms", summary.avg_latency_ms);

    println!("\nBy category:");
    for (category, stats) in &summary.by_category {
        let pct = if stats.total > 0 {
            stats.passed as f64 / stats.total as f64 * 100.0
        } else {
            0.0
        };
        println!("  {}: {}/{} ({:.0}%)", category, stats.passed, stats.total, pct);
    }

    export_results(&results, &args.output)?;
    println!("\nDetailed results exported to {}", args.output.display());

    Ok(())
}
