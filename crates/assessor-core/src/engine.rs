//! Batch assessment orchestrator.
//!
//! Looks every submission's target up in a [`QuestionRepository`] and grades
//! the batch on the blocking pool, bounded by the configured parallelism.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::assess::{Assessor, QuestionSetSubmission, QuestionSubmission};
use crate::error::AssessmentError;
use crate::report::AssessmentReport;
use crate::results::{SubmissionFailure, SubmissionResult, TargetKind};
use crate::statistics::summarize;
use crate::traits::QuestionRepository;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A question or a set/bank submission. Sets and banks share a namespace,
/// so the engine decides which one a `question_set_id` names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Submission {
    Set(QuestionSetSubmission),
    Question(QuestionSubmission),
}

impl Submission {
    pub fn target_id(&self) -> &str {
        match self {
            Submission::Set(s) => &s.question_set_id,
            Submission::Question(q) => &q.question_id,
        }
    }
}

/// One user's submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionEnvelope {
    /// Opaque user identifier; drives the randomization seed.
    #[serde(default)]
    pub user: String,
    pub submission: Submission,
}

impl SubmissionEnvelope {
    pub fn new(user: impl Into<String>, submission: Submission) -> Self {
        Self {
            user: user.into(),
            submission,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_submission_start(&self, user: &str, target_id: &str);
    fn on_submission_complete(&self, result: &SubmissionResult);
    fn on_submission_error(&self, user: &str, target_id: &str, error: &str);
    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_submission_start(&self, _: &str, _: &str) {}
    fn on_submission_complete(&self, _: &SubmissionResult) {}
    fn on_submission_error(&self, _: &str, _: &str, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct AssessmentEngine {
    assessor: Arc<Assessor>,
    repository: Arc<dyn QuestionRepository>,
    parallelism: usize,
}

impl AssessmentEngine {
    pub fn new(assessor: Arc<Assessor>, repository: Arc<dyn QuestionRepository>) -> Self {
        let parallelism = assessor.config().parallelism.max(1);
        Self {
            assessor,
            repository,
            parallelism,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Grade a batch. Submissions that fail as a whole are recorded in the
    /// report's failures and do not abort the run.
    pub async fn run(
        &self,
        submissions: Vec<SubmissionEnvelope>,
        progress: &dyn ProgressReporter,
    ) -> Result<AssessmentReport> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let semaphore = Arc::new(Semaphore::new(self.parallelism));

        let mut futures = FuturesUnordered::new();
        for envelope in submissions {
            let assessor = Arc::clone(&self.assessor);
            let repository = Arc::clone(&self.repository);
            let semaphore = Arc::clone(&semaphore);
            progress.on_submission_start(&envelope.user, envelope.submission.target_id());

            futures.push(async move {
                let user = envelope.user.clone();
                let target_id = envelope.submission.target_id().to_string();
                let inner = async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                    assess_one(assessor, repository.as_ref(), envelope, run_id).await
                };
                (user, target_id, inner.await)
            });
        }

        let total = futures.len();
        let mut results = Vec::new();
        let mut failures = Vec::new();

        while let Some((user, target_id, result)) = futures.next().await {
            match result {
                Ok(result) => {
                    progress.on_submission_complete(&result);
                    results.push(result);
                }
                Err(e) => {
                    tracing::error!("assessment failed for {user}/{target_id}: {e:#}");
                    progress.on_submission_error(&user, &target_id, &format!("{e:#}"));
                    failures.push(SubmissionFailure {
                        user,
                        target_id,
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        results.sort_by(|a, b| (&a.target_id, &a.user).cmp(&(&b.target_id, &b.user)));
        failures.sort_by(|a, b| (&a.target_id, &a.user).cmp(&(&b.target_id, &b.user)));

        let elapsed = start.elapsed();
        progress.on_batch_complete(total, results.len(), failures.len(), elapsed);
        tracing::info!(
            run_id = %run_id,
            total,
            failed = failures.len(),
            "assessment run complete"
        );

        Ok(AssessmentReport {
            id: run_id,
            created_at: chrono::Utc::now(),
            summary: summarize(&results, failures.len()),
            results,
            failures,
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}

async fn assess_one(
    assessor: Arc<Assessor>,
    repository: &dyn QuestionRepository,
    envelope: SubmissionEnvelope,
    run_id: Uuid,
) -> Result<SubmissionResult> {
    let SubmissionEnvelope { user, submission } = envelope;
    let unknown = |id: &str| AssessmentError::UnknownIdentifier(id.to_string());

    match submission {
        Submission::Question(submission) => {
            let question = repository
                .question(&submission.question_id)
                .await?
                .ok_or_else(|| unknown(&submission.question_id))?;
            tokio::task::spawn_blocking(move || -> Result<SubmissionResult> {
                let assessed = assessor.assess_question(&question, &submission, Some(&user))?;
                Ok(SubmissionResult::from_question(user, assessed, run_id))
            })
            .await
            .context("grading task panicked")?
        }
        Submission::Set(submission) => {
            let id = submission.question_set_id.clone();
            if let Some(set) = repository.question_set(&id).await? {
                return tokio::task::spawn_blocking(move || -> Result<SubmissionResult> {
                    let assessed = assessor.assess_question_set(&set, &submission, Some(&user))?;
                    Ok(SubmissionResult::from_set(
                        user,
                        assessed,
                        TargetKind::QuestionSet,
                        run_id,
                    ))
                })
                .await
                .context("grading task panicked")?;
            }
            let bank = repository
                .question_bank(&id)
                .await?
                .ok_or_else(|| unknown(&id))?;
            tokio::task::spawn_blocking(move || -> Result<SubmissionResult> {
                let assessed = assessor.assess_question_bank(&bank, &submission, Some(&user))?;
                Ok(SubmissionResult::from_set(
                    user,
                    assessed,
                    TargetKind::QuestionBank,
                    run_id,
                ))
            })
            .await
            .context("grading task panicked")?
        }
    }
}
