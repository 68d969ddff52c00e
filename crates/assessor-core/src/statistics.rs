//! Summary statistics over graded submissions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::results::SubmissionResult;

/// Statistics for one grading target across all users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetStats {
    pub target_id: String,
    pub submissions: usize,
    /// Mean over submissions that produced a score.
    pub mean_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    /// Submissions scoring 1.0.
    pub perfect: usize,
    pub invalid_parts: usize,
}

/// Statistics for one question across every target it was submitted in.
///
/// A low mean marks a hard (or badly keyed) question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionStats {
    pub question_id: String,
    pub attempts: usize,
    pub mean_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub submissions: usize,
    pub failures: usize,
    pub mean_score: Option<f64>,
    pub per_target: BTreeMap<String, TargetStats>,
    pub per_question: BTreeMap<String, QuestionStats>,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Compute summary statistics from graded results.
pub fn summarize(results: &[SubmissionResult], failures: usize) -> ReportSummary {
    let mut target_scores: BTreeMap<&str, Vec<&SubmissionResult>> = BTreeMap::new();
    for r in results {
        target_scores.entry(r.target_id.as_str()).or_default().push(r);
    }

    let per_target = target_scores
        .into_iter()
        .map(|(target_id, group)| {
            let scores: Vec<f64> = group.iter().filter_map(|r| r.score).collect();
            let stats = TargetStats {
                target_id: target_id.to_string(),
                submissions: group.len(),
                mean_score: mean(&scores),
                min_score: scores.iter().copied().reduce(f64::min),
                max_score: scores.iter().copied().reduce(f64::max),
                perfect: scores.iter().filter(|&&s| s >= 1.0).count(),
                invalid_parts: group.iter().map(|r| r.invalid_parts()).sum(),
            };
            (target_id.to_string(), stats)
        })
        .collect();

    let mut question_scores: BTreeMap<&str, (usize, Vec<f64>)> = BTreeMap::new();
    for question in results.iter().flat_map(|r| r.questions.iter()) {
        let entry = question_scores
            .entry(question.question_id.as_str())
            .or_default();
        entry.0 += 1;
        entry.1.extend(question.score());
    }
    let per_question = question_scores
        .into_iter()
        .map(|(question_id, (attempts, scores))| {
            (
                question_id.to_string(),
                QuestionStats {
                    question_id: question_id.to_string(),
                    attempts,
                    mean_score: mean(&scores),
                },
            )
        })
        .collect();

    let all: Vec<f64> = results.iter().filter_map(|r| r.score).collect();

    ReportSummary {
        submissions: results.len(),
        failures,
        mean_score: mean(&all),
        per_target,
        per_question,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assess::{AssessedPart, AssessedQuestion};
    use crate::results::TargetKind;
    use serde_json::Value;
    use uuid::Uuid;

    fn result(user: &str, target: &str, values: &[Option<f64>]) -> SubmissionResult {
        let question = AssessedQuestion {
            question_id: target.into(),
            parts: values
                .iter()
                .map(|v| AssessedPart {
                    submitted: Value::Null,
                    assessed_value: *v,
                    invalid: v.is_none().then(|| "bad".to_string()),
                })
                .collect(),
        };
        let r = SubmissionResult::from_question(user.into(), question, Uuid::nil());
        assert_eq!(r.target_kind, TargetKind::Question);
        r
    }

    #[test]
    fn per_target_stats() {
        let results = vec![
            result("u1", "q1", &[Some(1.0)]),
            result("u2", "q1", &[Some(0.0)]),
            result("u3", "q1", &[None]),
            result("u1", "q2", &[Some(1.0), Some(0.5)]),
        ];
        let summary = summarize(&results, 2);
        assert_eq!(summary.submissions, 4);
        assert_eq!(summary.failures, 2);

        let q1 = &summary.per_target["q1"];
        assert_eq!(q1.submissions, 3);
        assert_eq!(q1.mean_score, Some(0.5));
        assert_eq!(q1.min_score, Some(0.0));
        assert_eq!(q1.max_score, Some(1.0));
        assert_eq!(q1.perfect, 1);
        assert_eq!(q1.invalid_parts, 1);

        let q2 = &summary.per_target["q2"];
        assert_eq!(q2.mean_score, Some(0.75));
        assert_eq!(q2.perfect, 0);

        assert_eq!(summary.per_question["q1"].attempts, 3);
        assert_eq!(summary.mean_score, Some((1.0 + 0.0 + 0.75) / 3.0));
    }

    #[test]
    fn empty_summary() {
        let summary = summarize(&[], 0);
        assert_eq!(summary.mean_score, None);
        assert!(summary.per_target.is_empty());
    }
}
