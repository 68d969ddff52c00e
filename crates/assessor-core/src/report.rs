//! Assessment reports with JSON persistence and regression detection.
//!
//! Comparing two reports over the same submissions shows how a change to the
//! content (a new solution, a fixed regex, a unit list) moved the scores.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::results::{SubmissionFailure, SubmissionResult};
use crate::statistics::ReportSummary;

/// The outcome of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentReport {
    /// Unique run identifier.
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub results: Vec<SubmissionResult>,
    /// Submissions rejected as a whole.
    #[serde(default)]
    pub failures: Vec<SubmissionFailure>,
    pub summary: ReportSummary,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl AssessmentReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: AssessmentReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare this report against a baseline. Scores are matched by
    /// (user, target); a missing score counts as 0.
    pub fn compare(&self, baseline: &AssessmentReport, threshold: f64) -> RegressionReport {
        let score_map = |report: &AssessmentReport| -> HashMap<(String, String), f64> {
            report
                .results
                .iter()
                .map(|r| {
                    (
                        (r.user.clone(), r.target_id.clone()),
                        r.score.unwrap_or(0.0),
                    )
                })
                .collect()
        };

        let baseline_scores = score_map(baseline);
        let current_scores = score_map(self);

        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged = 0usize;
        let mut new_results = 0usize;

        for ((user, target_id), &current) in &current_scores {
            let Some(&baseline_score) = baseline_scores.get(&(user.clone(), target_id.clone()))
            else {
                new_results += 1;
                continue;
            };
            let delta = current - baseline_score;
            let change = ScoreChange {
                user: user.clone(),
                target_id: target_id.clone(),
                baseline_score,
                current_score: current,
                delta,
            };
            if delta < -threshold {
                regressions.push(change);
            } else if delta > threshold {
                improvements.push(change);
            } else {
                unchanged += 1;
            }
        }

        regressions.sort_by(|a, b| a.delta.total_cmp(&b.delta));
        improvements.sort_by(|a, b| b.delta.total_cmp(&a.delta));

        let removed_results = baseline_scores
            .keys()
            .filter(|k| !current_scores.contains_key(*k))
            .count();

        RegressionReport {
            regressions,
            improvements,
            unchanged,
            new_results,
            removed_results,
        }
    }
}

/// Result of comparing two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionReport {
    /// Worst first.
    pub regressions: Vec<ScoreChange>,
    /// Best first.
    pub improvements: Vec<ScoreChange>,
    pub unchanged: usize,
    /// In current but not baseline.
    pub new_results: usize,
    /// In baseline but not current.
    pub removed_results: usize,
}

/// A score that moved past the comparison threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreChange {
    pub user: String,
    pub target_id: String,
    pub baseline_score: f64,
    pub current_score: f64,
    pub delta: f64,
}

impl RegressionReport {
    /// Format the regression report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged
        ));

        let mut table = |title: &str, rows: &[ScoreChange], sign: &str| {
            if rows.is_empty() {
                return;
            }
            md.push_str(&format!("### {title}\n\n"));
            md.push_str("| User | Target | Baseline | Current | Delta |\n");
            md.push_str("|------|--------|----------|---------|-------|\n");
            for r in rows {
                md.push_str(&format!(
                    "| {} | {} | {:.1}% | {:.1}% | {sign}{:.1}% |\n",
                    r.user,
                    r.target_id,
                    r.baseline_score * 100.0,
                    r.current_score * 100.0,
                    r.delta * 100.0
                ));
            }
            md.push('\n');
        };
        table("Regressions", &self.regressions, "");
        table("Improvements", &self.improvements, "+");

        md
    }

    /// Returns true if there are any regressions.
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assess::{AssessedPart, AssessedQuestion};
    use crate::statistics::summarize;
    use serde_json::Value;

    fn make_report(results: Vec<SubmissionResult>) -> AssessmentReport {
        AssessmentReport {
            id: Uuid::nil(),
            created_at: Utc::now(),
            summary: summarize(&results, 0),
            results,
            failures: vec![],
            duration_ms: 0,
        }
    }

    fn make_result(user: &str, target: &str, score: f64) -> SubmissionResult {
        let question = AssessedQuestion {
            question_id: target.into(),
            parts: vec![AssessedPart {
                submitted: Value::Null,
                assessed_value: Some(score),
                invalid: None,
            }],
        };
        SubmissionResult::from_question(user.into(), question, Uuid::nil())
    }

    #[test]
    fn compare_identical_reports() {
        let r1 = make_result("u1", "q1", 1.0);
        let baseline = make_report(vec![r1.clone()]);
        let current = make_report(vec![r1]);

        let report = current.compare(&baseline, 0.05);
        assert!(report.regressions.is_empty());
        assert!(report.improvements.is_empty());
        assert_eq!(report.unchanged, 1);
    }

    #[test]
    fn compare_with_regression_and_improvement() {
        let baseline = make_report(vec![
            make_result("u1", "q1", 1.0),
            make_result("u2", "q1", 0.0),
        ]);
        let current = make_report(vec![
            make_result("u1", "q1", 0.0),
            make_result("u2", "q1", 0.5),
        ]);

        let report = current.compare(&baseline, 0.05);
        assert!(report.has_regressions());
        assert_eq!(report.regressions.len(), 1);
        assert_eq!(report.regressions[0].user, "u1");
        assert_eq!(report.regressions[0].delta, -1.0);
        assert_eq!(report.improvements.len(), 1);
        assert_eq!(report.improvements[0].user, "u2");
    }

    #[test]
    fn small_changes_are_unchanged() {
        let baseline = make_report(vec![make_result("u1", "q1", 0.5)]);
        let current = make_report(vec![make_result("u1", "q1", 0.52)]);
        let report = current.compare(&baseline, 0.05);
        assert_eq!(report.unchanged, 1);
        assert!(!report.has_regressions());
    }

    #[test]
    fn compare_with_new_and_removed() {
        let baseline = make_report(vec![make_result("u1", "old", 1.0)]);
        let current = make_report(vec![make_result("u1", "new", 1.0)]);

        let report = current.compare(&baseline, 0.05);
        assert_eq!(report.new_results, 1);
        assert_eq!(report.removed_results, 1);
    }

    #[test]
    fn json_roundtrip() {
        let report = make_report(vec![make_result("u1", "q1", 1.0)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        report.save_json(&path).unwrap();
        let loaded = AssessmentReport::load_json(&path).unwrap();

        assert_eq!(loaded.results, report.results);
        assert_eq!(loaded.summary, report.summary);
    }

    #[test]
    fn markdown_output() {
        let baseline = make_report(vec![make_result("u1", "q1", 1.0)]);
        let current = make_report(vec![make_result("u1", "q1", 0.0)]);

        let md = current.compare(&baseline, 0.05).to_markdown();
        assert!(md.contains("### Regressions"));
        assert!(md.contains("| u1 | q1 | 100.0% | 0.0% | -100.0% |"));
        assert!(!md.contains("Improvements"));
    }
}
