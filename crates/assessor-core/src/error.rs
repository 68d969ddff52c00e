//! Assessment error types.
//!
//! Normalization errors belong to a single part and never abort the grading of
//! sibling parts. Assessment errors reject a whole submission.

use thiserror::Error;

use crate::model::{PartKind, SolutionKind};
use crate::response::ResponseKind;

/// A raw submitted value could not be coerced to the part's response type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// The JSON shape does not fit the part kind at all.
    #[error("{kind} part expects {expected}, got {found}")]
    WrongShape {
        kind: PartKind,
        expected: &'static str,
        found: &'static str,
    },

    /// A choice was submitted as text that is neither a choice nor an index.
    #[error("unknown choice: {0:?}")]
    UnknownChoice(String),

    /// A numeric index was negative or fractional.
    #[error("not a valid index: {0}")]
    InvalidIndex(String),

    /// A matching/ordering key is neither a label nor a label index.
    #[error("unknown connection key: {0:?}")]
    UnknownConnectionKey(String),

    /// A word id that is not in the part's word bank.
    #[error("word {wid:?} is not in the word bank")]
    UnknownWord { wid: String },

    /// The same word filled two blanks of a unique word bank.
    #[error("word {wid:?} used in more than one blank")]
    DuplicateWord { wid: String },

    /// An uploaded file does not satisfy the part's restrictions.
    #[error("file rejected: {0}")]
    FileRejected(String),
}

/// A whole submission could not be assessed.
#[derive(Debug, Error)]
pub enum AssessmentError {
    /// The referenced question, set, poll, or survey does not exist.
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// The submission's part count differs from the target's.
    #[error("{id}: expected {expected} part(s), submission has {found}")]
    PartCountMismatch {
        id: String,
        expected: usize,
        found: usize,
    },

    /// A submitted question is not part of the targeted set (or of the
    /// user's draw from a question bank).
    #[error("question {question_id} is not part of {container_id}")]
    QuestionNotInSet {
        container_id: String,
        question_id: String,
    },

    /// No grader is registered for the combination. This is a configuration
    /// defect, not a user error.
    #[error("no grader registered for part={part} solution={solution} response={response}")]
    UnregisteredGrader {
        part: PartKind,
        solution: SolutionKind,
        response: ResponseKind,
    },

    /// Authored content violates a structural invariant.
    #[error("invalid content in {id}: {message}")]
    InvalidContent { id: String, message: String },
}

impl AssessmentError {
    /// Returns `true` if the error points at a server-side defect rather
    /// than at the submitted data.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            AssessmentError::UnregisteredGrader { .. } | AssessmentError::InvalidContent { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_distinguished() {
        let unregistered = AssessmentError::UnregisteredGrader {
            part: PartKind::FreeResponse,
            solution: SolutionKind::Math,
            response: ResponseKind::Text,
        };
        assert!(unregistered.is_configuration_error());
        assert!(!AssessmentError::UnknownIdentifier("q".into()).is_configuration_error());
        assert_eq!(
            unregistered.to_string(),
            "no grader registered for part=free_response solution=math response=text"
        );
    }

    #[test]
    fn part_count_message() {
        let err = AssessmentError::PartCountMismatch {
            id: "q1".into(),
            expected: 2,
            found: 3,
        };
        assert_eq!(err.to_string(), "q1: expected 2 part(s), submission has 3");
    }
}
