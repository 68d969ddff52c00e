//! The `assessor grade` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Table};

use assessor_core::assess::Assessor;
use assessor_core::config::load_config;
use assessor_core::engine::{AssessmentEngine, ProgressReporter, SubmissionEnvelope};
use assessor_core::parser::load_content;
use assessor_core::report::AssessmentReport;
use assessor_core::repository::InMemoryRepository;
use assessor_core::results::SubmissionResult;

use super::{percent, read_json};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_submission_start(&self, _: &str, _: &str) {}

    fn on_submission_complete(&self, result: &SubmissionResult) {
        tracing::debug!(
            user = %result.user,
            target = %result.target_id,
            score = ?result.score,
            "graded"
        );
    }

    fn on_submission_error(&self, user: &str, target_id: &str, error: &str) {
        eprintln!("  ERROR: {user} :: {target_id}: {error}");
    }

    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "Complete: {completed}/{total} graded, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    content_path: PathBuf,
    submissions_path: PathBuf,
    format: String,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let bundle = load_content(&content_path)?;
    let submissions: Vec<SubmissionEnvelope> = read_json(&submissions_path)?;

    let engine = AssessmentEngine::new(
        Arc::new(Assessor::new(config)),
        Arc::new(InMemoryRepository::new(bundle)),
    );
    let report = engine.run(submissions, &ConsoleReporter).await?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_tables(&report),
    }

    if let Some(path) = output {
        report.save_json(&path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn print_tables(report: &AssessmentReport) {
    let mut results = Table::new();
    results.set_header(vec!["User", "Target", "Kind", "Score", "Invalid parts"]);
    for r in &report.results {
        results.add_row(vec![
            Cell::new(&r.user),
            Cell::new(&r.target_id),
            Cell::new(r.target_kind),
            Cell::new(percent(r.score)),
            Cell::new(r.invalid_parts()),
        ]);
    }
    for f in &report.failures {
        results.add_row(vec![
            Cell::new(&f.user),
            Cell::new(&f.target_id),
            Cell::new("-"),
            Cell::new("FAILED"),
            Cell::new(&f.error),
        ]);
    }
    println!("{results}");

    let mut targets = Table::new();
    targets.set_header(vec!["Target", "Submissions", "Mean", "Min", "Max", "Perfect"]);
    for stats in report.summary.per_target.values() {
        targets.add_row(vec![
            Cell::new(&stats.target_id),
            Cell::new(stats.submissions),
            Cell::new(percent(stats.mean_score)),
            Cell::new(percent(stats.min_score)),
            Cell::new(percent(stats.max_score)),
            Cell::new(stats.perfect),
        ]);
    }
    println!("\n{targets}");
    println!(
        "\n{} graded, {} failed, mean {}",
        report.summary.submissions,
        report.summary.failures,
        percent(report.summary.mean_score)
    );
}
