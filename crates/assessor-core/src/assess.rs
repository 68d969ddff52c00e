//! Assessment of submissions against questions, sets, and banks.
//!
//! Every part goes through the same pipeline: normalize the raw value against
//! the part as the user saw it, then grade against the canonical part.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GradingConfig;
use crate::error::AssessmentError;
use crate::model::{Part, Question, QuestionBank, QuestionSet};
use crate::random::randomize_part;
use crate::registry::GraderRegistry;
use crate::response::normalize;
use crate::traits::{DigestSeedProvider, SeedProvider};

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

/// Raw answers to one question, one value per part, in part order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSubmission {
    pub question_id: String,
    #[serde(default)]
    pub parts: Vec<Value>,
}

/// Answers to some questions of a set or bank, in any order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSetSubmission {
    pub question_set_id: String,
    #[serde(default)]
    pub questions: Vec<QuestionSubmission>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessedPart {
    /// The raw value as submitted.
    pub submitted: Value,
    /// Score in [0.0, 1.0], or `None` when the part cannot be scored
    /// automatically or the submission was invalid.
    pub assessed_value: Option<f64>,
    /// Why the submitted value was rejected, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessedQuestion {
    pub question_id: String,
    pub parts: Vec<AssessedPart>,
}

impl AssessedQuestion {
    /// Mean of the scored parts; `None` when no part was scored.
    pub fn score(&self) -> Option<f64> {
        mean(self.parts.iter().filter_map(|p| p.assessed_value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessedQuestionSet {
    pub question_set_id: String,
    pub questions: Vec<AssessedQuestion>,
}

impl AssessedQuestionSet {
    /// Mean over every scored part of every question.
    pub fn score(&self) -> Option<f64> {
        mean(
            self.questions
                .iter()
                .flat_map(|q| q.parts.iter())
                .filter_map(|p| p.assessed_value),
        )
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

// ---------------------------------------------------------------------------
// Assessor
// ---------------------------------------------------------------------------

/// Grades submissions. Stateless apart from its configuration, so one
/// instance can be shared across threads.
pub struct Assessor {
    registry: GraderRegistry,
    seeds: Arc<dyn SeedProvider>,
    config: GradingConfig,
}

impl Assessor {
    /// Default graders and digest-derived user seeds.
    pub fn new(config: GradingConfig) -> Self {
        Self {
            registry: GraderRegistry::with_defaults(&config),
            seeds: Arc::new(DigestSeedProvider),
            config,
        }
    }

    pub fn with_registry(mut self, registry: GraderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_seeds(mut self, seeds: Arc<dyn SeedProvider>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn config(&self) -> &GradingConfig {
        &self.config
    }

    pub fn registry(&self) -> &GraderRegistry {
        &self.registry
    }

    pub fn seed_for(&self, user: Option<&str>) -> Option<u64> {
        user.and_then(|u| self.seeds.seed_for(u))
    }

    /// Assess one raw value against one part on behalf of `user`.
    pub fn assess_part(
        &self,
        part: &Part,
        raw: &Value,
        user: Option<&str>,
    ) -> Result<AssessedPart, AssessmentError> {
        self.assess_part_seeded(part, raw, self.seed_for(user))
    }

    fn assess_part_seeded(
        &self,
        part: &Part,
        raw: &Value,
        seed: Option<u64>,
    ) -> Result<AssessedPart, AssessmentError> {
        let displayed = seed.and_then(|s| randomize_part(part, s));
        let normalized = normalize(displayed.as_ref().unwrap_or(part), raw);

        let response = match normalized {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(kind = %part.kind(), error = %e, "invalid submission");
                return Ok(AssessedPart {
                    submitted: raw.clone(),
                    assessed_value: None,
                    invalid: Some(e.to_string()),
                });
            }
        };

        let assessed_value = if !part.kind().is_gradable() {
            None
        } else {
            match response {
                // Unanswered is wrong, unless the part has no opinion at all.
                None => (!part.solutions.is_empty()).then_some(0.0),
                Some(response) => self.registry.grade_part(part, &response, seed)?,
            }
        };

        Ok(AssessedPart {
            submitted: raw.clone(),
            assessed_value,
            invalid: None,
        })
    }

    /// Assess every part of one question. The submission must carry exactly
    /// one value per part.
    pub fn assess_question(
        &self,
        question: &Question,
        submission: &QuestionSubmission,
        user: Option<&str>,
    ) -> Result<AssessedQuestion, AssessmentError> {
        self.assess_question_seeded(question, submission, self.seed_for(user))
    }

    fn assess_question_seeded(
        &self,
        question: &Question,
        submission: &QuestionSubmission,
        seed: Option<u64>,
    ) -> Result<AssessedQuestion, AssessmentError> {
        if submission.question_id != question.id {
            return Err(AssessmentError::UnknownIdentifier(
                submission.question_id.clone(),
            ));
        }
        if submission.parts.len() != question.parts.len() {
            return Err(AssessmentError::PartCountMismatch {
                id: question.id.clone(),
                expected: question.parts.len(),
                found: submission.parts.len(),
            });
        }
        if let Some((index, part)) = question
            .parts
            .iter()
            .enumerate()
            .find(|(_, part)| !part.solutions_match_kind())
        {
            return Err(AssessmentError::InvalidContent {
                id: question.id.clone(),
                message: format!("part {index}: solution kind does not match {} part", part.kind()),
            });
        }

        let parts = question
            .parts
            .iter()
            .zip(&submission.parts)
            .map(|(part, raw)| self.assess_part_seeded(part, raw, seed))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AssessedQuestion {
            question_id: question.id.clone(),
            parts,
        })
    }

    /// Assess the submitted questions of a set. Questions may come in any
    /// order; unsubmitted questions are left out of the result.
    pub fn assess_question_set(
        &self,
        set: &QuestionSet,
        submission: &QuestionSetSubmission,
        user: Option<&str>,
    ) -> Result<AssessedQuestionSet, AssessmentError> {
        self.assess_in(set, submission, self.seed_for(user), None)
    }

    /// Assess a question bank submission. Every submitted question must be
    /// part of the user's draw. Without a seed there is no per-user draw and
    /// the whole pool is accepted.
    pub fn assess_question_bank(
        &self,
        bank: &QuestionBank,
        submission: &QuestionSetSubmission,
        user: Option<&str>,
    ) -> Result<AssessedQuestionSet, AssessmentError> {
        let seed = self.seed_for(user);
        let drawn = seed.map(|s| {
            bank.draw_for(s)
                .into_iter()
                .filter_map(|i| bank.set.questions.get(i))
                .map(|q| q.id.as_str())
                .collect::<HashSet<_>>()
        });
        self.assess_in(&bank.set, submission, seed, drawn.as_ref())
    }

    fn assess_in(
        &self,
        set: &QuestionSet,
        submission: &QuestionSetSubmission,
        seed: Option<u64>,
        drawn: Option<&HashSet<&str>>,
    ) -> Result<AssessedQuestionSet, AssessmentError> {
        if submission.question_set_id != set.id {
            return Err(AssessmentError::UnknownIdentifier(
                submission.question_set_id.clone(),
            ));
        }

        let questions = submission
            .questions
            .iter()
            .map(|q| {
                let not_in_set = || AssessmentError::QuestionNotInSet {
                    container_id: set.id.clone(),
                    question_id: q.question_id.clone(),
                };
                let question = set.question(&q.question_id).ok_or_else(not_in_set)?;
                if drawn.is_some_and(|ids| !ids.contains(q.question_id.as_str())) {
                    return Err(not_in_set());
                }
                self.assess_question_seeded(question, q, seed)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AssessedQuestionSet {
            question_set_id: set.id.clone(),
            questions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PartBody, Solution, SolutionValue};
    use crate::random::randomize_view;
    use crate::traits::FixedSeeds;
    use serde_json::json;

    fn assessor() -> Assessor {
        Assessor::new(GradingConfig::default())
            .with_seeds(Arc::new(FixedSeeds::new().with("u1", 100).with("u2", 500)))
    }

    fn free_response_question() -> Question {
        Question::new(
            "q-free",
            vec![Part::new(PartBody::FreeResponse).with_solution(Solution::new(
                SolutionValue::FreeResponse("correct".into()),
            ))],
        )
    }

    fn submit(question_id: &str, parts: Vec<Value>) -> QuestionSubmission {
        QuestionSubmission {
            question_id: question_id.into(),
            parts,
        }
    }

    #[test]
    fn free_response_end_to_end() {
        let assessor = assessor();
        let question = free_response_question();
        let value = |raw: Value| {
            assessor
                .assess_question(&question, &submit("q-free", vec![raw]), None)
                .unwrap()
                .parts[0]
                .assessed_value
        };
        assert_eq!(value(json!("Correct")), Some(1.0));
        assert_eq!(value(json!("wrong")), Some(0.0));
        assert_eq!(value(Value::Null), Some(0.0));
    }

    #[test]
    fn weight_is_applied() {
        let part = Part::new(PartBody::NumericMath)
            .with_solution(Solution::weighted(SolutionValue::math("42"), 0.75));
        let assessor = assessor();
        let right = assessor.assess_part(&part, &json!("42"), None).unwrap();
        let wrong = assessor.assess_part(&part, &json!("41"), None).unwrap();
        assert_eq!(right.assessed_value, Some(0.75));
        assert_eq!(wrong.assessed_value, Some(0.0));
        assert_eq!(
            assessor.assess_part(&part, &Value::Null, None).unwrap().assessed_value,
            Some(0.0)
        );
    }

    #[test]
    fn part_count_must_match() {
        let err = assessor()
            .assess_question(
                &free_response_question(),
                &submit("q-free", vec![json!("a"), json!("b")]),
                None,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            AssessmentError::PartCountMismatch {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn invalid_part_does_not_abort_siblings() {
        let question = Question::new(
            "q-two",
            vec![
                Part::new(PartBody::MultipleChoice {
                    choices: vec!["a".into(), "b".into()],
                })
                .with_solution(Solution::new(SolutionValue::MultipleChoice(0))),
                Part::new(PartBody::FreeResponse).with_solution(Solution::new(
                    SolutionValue::FreeResponse("yes".into()),
                )),
            ],
        );
        let assessed = assessor()
            .assess_question(&question, &submit("q-two", vec![json!({"x": 1}), json!("YES")]), None)
            .unwrap();
        assert_eq!(assessed.parts[0].assessed_value, None);
        assert!(assessed.parts[0].invalid.is_some());
        assert_eq!(assessed.parts[1].assessed_value, Some(1.0));
        assert_eq!(assessed.score(), Some(1.0));
    }

    #[test]
    fn non_gradable_parts_are_none() {
        let assessor = assessor();
        let essay = Part::new(PartBody::ModeledContent);
        let assessed = assessor.assess_part(&essay, &json!("my essay"), None).unwrap();
        assert_eq!(assessed.assessed_value, None);
        assert_eq!(assessed.invalid, None);

        let upload = Part::new(PartBody::File {
            allowed_mime_types: vec![],
            allowed_extensions: vec![],
            max_file_size: None,
        });
        let assessed = assessor
            .assess_part(&upload, &json!({"filename": "a.pdf"}), None)
            .unwrap();
        assert_eq!(assessed.assessed_value, None);
    }

    fn randomized_mc() -> Question {
        let choices: Vec<String> = (0..6).map(|i| format!("choice {i}")).collect();
        Question::new(
            "q-mc",
            vec![Part::new(PartBody::MultipleChoice { choices })
                .with_solution(Solution::new(SolutionValue::MultipleChoice(4)))
                .randomized()],
        )
    }

    #[test]
    fn randomized_part_graded_in_display_order() {
        let assessor = assessor();
        let question = randomized_mc();
        for user in ["u1", "u2"] {
            let seed = assessor.seed_for(Some(user)).unwrap();
            let view = randomize_view(&question, seed);
            let displayed = view.question.parts[0]
                .choices()
                .unwrap()
                .iter()
                .position(|c| c == "choice 4")
                .unwrap();

            let by_index = assessor
                .assess_question(&question, &submit("q-mc", vec![json!(displayed)]), Some(user))
                .unwrap();
            assert_eq!(by_index.parts[0].assessed_value, Some(1.0), "{user}");

            let by_text = assessor
                .assess_question(&question, &submit("q-mc", vec![json!("choice 4")]), Some(user))
                .unwrap();
            assert_eq!(by_text.parts[0].assessed_value, Some(1.0), "{user}");
        }
    }

    #[test]
    fn randomized_answers_and_connections_graded_in_display_order() {
        let assessor = assessor();
        let answers = Part::new(PartBody::MultipleAnswer {
            choices: (0..5).map(|i| format!("option {i}")).collect(),
        })
        .with_solution(Solution::new(SolutionValue::MultipleAnswer(vec![0, 3])))
        .randomized();
        let matching = Part::new(PartBody::Matching {
            labels: vec!["cat".into(), "dog".into(), "cow".into()],
            values: vec!["meow".into(), "woof".into(), "moo".into()],
        })
        .with_solution(Solution::new(SolutionValue::Connecting(
            (0..3).map(|i| (i, i)).collect(),
        )))
        .randomized();
        let steps = ["wake", "eat", "work", "sleep"];
        let ordering = Part::new(PartBody::Ordering {
            labels: vec!["1st".into(), "2nd".into(), "3rd".into(), "4th".into()],
            values: steps.iter().map(|s| s.to_string()).collect(),
        })
        .with_solution(Solution::new(SolutionValue::Connecting(
            (0..4).map(|i| (i, i)).collect(),
        )))
        .randomized();
        let question = Question::new("q-mixed", vec![answers, matching, ordering]);

        for user in ["u1", "u2"] {
            let seed = assessor.seed_for(Some(user)).unwrap();
            let view = randomize_view(&question, seed);
            let position = |part: usize, text: &str| -> usize {
                let shown = match &view.question.parts[part].body {
                    PartBody::MultipleAnswer { choices } => choices,
                    PartBody::Matching { values, .. } | PartBody::Ordering { values, .. } => values,
                    other => panic!("not a randomized body: {other:?}"),
                };
                shown.iter().position(|s| s == text).unwrap()
            };

            let by_index = vec![
                json!([position(0, "option 3"), position(0, "option 0")]),
                json!({
                    "cat": position(1, "meow"),
                    "dog": position(1, "woof"),
                    "cow": position(1, "moo"),
                }),
                json!(steps.iter().map(|s| position(2, s)).collect::<Vec<_>>()),
            ];
            let by_text = vec![
                json!(["option 0", "option 3"]),
                json!({"dog": "woof", "cat": "meow", "cow": "moo"}),
                json!(steps),
            ];
            let wrong = vec![
                json!(["option 0"]),
                json!({"cat": "woof", "dog": "meow", "cow": "moo"}),
                json!(["eat", "wake", "work", "sleep"]),
            ];

            for (label, raw, expected) in [
                ("by index", by_index, 1.0),
                ("by text", by_text, 1.0),
                ("wrong", wrong, 0.0),
            ] {
                let assessed = assessor
                    .assess_question(&question, &submit("q-mixed", raw), Some(user))
                    .unwrap();
                for (i, part) in assessed.parts.iter().enumerate() {
                    assert_eq!(part.assessed_value, Some(expected), "{user} {label} part {i}");
                }
            }
        }
    }

    #[test]
    fn mismatched_solution_kind_is_invalid_content() {
        let question = Question::new(
            "q-bad",
            vec![Part::new(PartBody::FreeResponse)
                .with_solution(Solution::new(SolutionValue::math("1")))],
        );
        let err = assessor()
            .assess_question(&question, &submit("q-bad", vec![json!("1")]), None)
            .unwrap_err();
        assert!(err.is_configuration_error());
        assert!(matches!(err, AssessmentError::InvalidContent { ref id, .. } if id == "q-bad"));
        assert_eq!(
            err.to_string(),
            "invalid content in q-bad: part 0: solution kind does not match free_response part"
        );
    }

    fn bank(draw: usize) -> QuestionBank {
        let questions = (0..20)
            .map(|i| {
                Question::new(
                    format!("q{i}"),
                    vec![Part::new(PartBody::FreeResponse).with_solution(Solution::new(
                        SolutionValue::FreeResponse(format!("answer {i}")),
                    ))],
                )
            })
            .collect();
        QuestionBank {
            set: QuestionSet {
                id: "bank".into(),
                title: String::new(),
                questions,
            },
            draw: Some(draw),
            ranges: vec![],
            high_entropy: false,
        }
    }

    #[test]
    fn bank_draws_differ_per_user_and_repeat_per_seed() {
        let bank = bank(5);
        let u1 = bank.draw_for(100);
        let u2 = bank.draw_for(500);
        assert_eq!(u1.len(), 5);
        assert_eq!(u2.len(), 5);
        assert_ne!(u1, u2);
        assert_eq!(u1, bank.draw_for(100));
    }

    #[test]
    fn bank_submission_must_stay_in_draw() {
        let bank = bank(5);
        let assessor = assessor();
        let drawn = bank.draw_for(100);
        let inside = drawn[0];
        let outside = (0..20).find(|i| !drawn.contains(i)).unwrap();

        let submission = |i: usize| QuestionSetSubmission {
            question_set_id: "bank".into(),
            questions: vec![submit(&format!("q{i}"), vec![json!(format!("Answer {i}"))])],
        };

        let assessed = assessor
            .assess_question_bank(&bank, &submission(inside), Some("u1"))
            .unwrap();
        assert_eq!(assessed.score(), Some(1.0));

        let err = assessor
            .assess_question_bank(&bank, &submission(outside), Some("u1"))
            .unwrap_err();
        assert!(matches!(err, AssessmentError::QuestionNotInSet { .. }));

        // No seed, no per-user draw.
        assert!(assessor
            .assess_question_bank(&bank, &submission(outside), None)
            .is_ok());
    }

    #[test]
    fn set_submission_order_is_free() {
        let bank = bank(20);
        let set = &bank.set;
        let submission = QuestionSetSubmission {
            question_set_id: "bank".into(),
            questions: vec![
                submit("q3", vec![json!("answer 3")]),
                submit("q1", vec![json!("nope")]),
            ],
        };
        let assessed = assessor().assess_question_set(set, &submission, None).unwrap();
        assert_eq!(assessed.questions[0].question_id, "q3");
        assert_eq!(assessed.score(), Some(0.5));

        let unknown = QuestionSetSubmission {
            question_set_id: "bank".into(),
            questions: vec![submit("q99", vec![json!("x")])],
        };
        assert!(matches!(
            assessor().assess_question_set(set, &unknown, None),
            Err(AssessmentError::QuestionNotInSet { .. })
        ));
    }
}
