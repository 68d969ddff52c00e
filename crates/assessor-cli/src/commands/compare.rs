//! The `assessor compare` command.

use std::path::PathBuf;

use anyhow::Result;

use assessor_core::report::AssessmentReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");

    let baseline = AssessmentReport::load_json(&baseline_path)?;
    let current = AssessmentReport::load_json(&current_path)?;

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => println!("{}", report.to_markdown()),
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            println!(
                "Comparison: {} regressions, {} improvements, {} unchanged",
                report.regressions.len(),
                report.improvements.len(),
                report.unchanged
            );

            for (title, rows) in [
                ("Regressions", &report.regressions),
                ("Improvements", &report.improvements),
            ] {
                if rows.is_empty() {
                    continue;
                }
                println!("\n{title}:");
                for r in rows {
                    println!(
                        "  {} ({}) {:.1}% -> {:.1}% ({:+.1}%)",
                        r.target_id,
                        r.user,
                        r.baseline_score * 100.0,
                        r.current_score * 100.0,
                        r.delta * 100.0
                    );
                }
            }

            if report.new_results > 0 {
                println!("\n{} new result(s)", report.new_results);
            }
            if report.removed_results > 0 {
                println!("{} removed result(s)", report.removed_results);
            }
        }
    }

    if fail_on_regression && report.has_regressions() {
        std::process::exit(1);
    }

    Ok(())
}
