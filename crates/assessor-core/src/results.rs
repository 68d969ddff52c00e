//! Per-submission outcomes of a batch run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assess::{AssessedQuestion, AssessedQuestionSet};

/// What a submission was graded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Question,
    QuestionSet,
    QuestionBank,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Question => write!(f, "question"),
            TargetKind::QuestionSet => write!(f, "question_set"),
            TargetKind::QuestionBank => write!(f, "question_bank"),
        }
    }
}

/// A graded submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    /// Opaque submitting user.
    pub user: String,
    pub target_id: String,
    pub target_kind: TargetKind,
    /// Mean of the scored parts; `None` when nothing was scorable.
    pub score: Option<f64>,
    pub questions: Vec<AssessedQuestion>,
    /// Run that produced this result.
    pub run_id: Uuid,
}

impl SubmissionResult {
    pub fn from_question(
        user: String,
        question: AssessedQuestion,
        run_id: Uuid,
    ) -> Self {
        Self {
            user,
            target_id: question.question_id.clone(),
            target_kind: TargetKind::Question,
            score: question.score(),
            questions: vec![question],
            run_id,
        }
    }

    pub fn from_set(
        user: String,
        set: AssessedQuestionSet,
        target_kind: TargetKind,
        run_id: Uuid,
    ) -> Self {
        Self {
            user,
            score: set.score(),
            target_id: set.question_set_id,
            target_kind,
            questions: set.questions,
            run_id,
        }
    }

    /// Parts whose submitted value was rejected.
    pub fn invalid_parts(&self) -> usize {
        self.questions
            .iter()
            .flat_map(|q| q.parts.iter())
            .filter(|p| p.invalid.is_some())
            .count()
    }
}

/// A submission that could not be graded at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionFailure {
    pub user: String,
    pub target_id: String,
    pub error: String,
}
