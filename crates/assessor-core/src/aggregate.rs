//! Poll and survey aggregation.
//!
//! Polls are not graded; their submissions are normalized like graded parts
//! and tallied per part.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AssessmentError;
use crate::model::{Part, PartKind, Poll, Survey};
use crate::response::{normalize, FileRef, Response};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSubmission {
    pub poll_id: String,
    #[serde(default)]
    pub parts: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveySubmission {
    pub survey_id: String,
    #[serde(default)]
    pub polls: Vec<PollSubmission>,
}

/// How often a label was connected to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCount {
    pub label: usize,
    pub value: usize,
    pub count: usize,
}

/// Per-kind counts for one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Tally {
    /// Choice index to number of times picked.
    Choices { counts: BTreeMap<usize, usize> },
    Pairs { counts: Vec<PairCount> },
    /// Normalized text to occurrences.
    Text { counts: BTreeMap<String, usize> },
    /// Blank id to filled-in text (or word id) to occurrences.
    Blanks {
        counts: BTreeMap<String, BTreeMap<String, usize>>,
    },
    Bodies { bodies: Vec<Vec<String>> },
    Files { files: Vec<FileRef> },
}

impl Tally {
    fn for_kind(kind: PartKind) -> Self {
        match kind {
            PartKind::MultipleChoice | PartKind::MultipleAnswer => Tally::Choices {
                counts: BTreeMap::new(),
            },
            PartKind::Matching | PartKind::Ordering => Tally::Pairs { counts: Vec::new() },
            PartKind::FreeResponse | PartKind::NumericMath | PartKind::SymbolicMath => {
                Tally::Text {
                    counts: BTreeMap::new(),
                }
            }
            PartKind::FillInTheBlankShortAnswer | PartKind::FillInTheBlankWordBank => {
                Tally::Blanks {
                    counts: BTreeMap::new(),
                }
            }
            PartKind::ModeledContent => Tally::Bodies { bodies: Vec::new() },
            PartKind::File => Tally::Files { files: Vec::new() },
        }
    }

    fn record(&mut self, response: Response) {
        match (self, response) {
            (Tally::Choices { counts }, Response::Index(i)) => {
                *counts.entry(i).or_default() += 1;
            }
            (Tally::Choices { counts }, Response::Indices(indices)) => {
                for i in indices {
                    *counts.entry(i).or_default() += 1;
                }
            }
            (Tally::Pairs { counts }, Response::Connections(map)) => {
                for (label, value) in map {
                    match counts
                        .iter_mut()
                        .find(|p| p.label == label && p.value == value)
                    {
                        Some(pair) => pair.count += 1,
                        None => counts.push(PairCount {
                            label,
                            value,
                            count: 1,
                        }),
                    }
                }
                counts.sort_by_key(|p| (p.label, p.value));
            }
            (Tally::Text { counts }, Response::Text(text)) => {
                *counts.entry(text).or_default() += 1;
            }
            (Tally::Blanks { counts }, Response::Blanks(blanks)) => {
                for (blank, value) in blanks {
                    let per_blank = counts.entry(blank).or_default();
                    for word in value.words() {
                        *per_blank.entry(word.to_string()).or_default() += 1;
                    }
                }
            }
            (Tally::Bodies { bodies }, Response::ModeledContent(body)) => bodies.push(body),
            (Tally::Files { files }, Response::File(file)) => files.push(file),
            (tally, response) => {
                tracing::debug!(?response, ?tally, "response shape does not fit tally");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPart {
    pub kind: PartKind,
    /// Answered (non-empty, valid) submissions.
    pub responses: usize,
    /// Submissions rejected by normalization; not tallied.
    pub invalid: usize,
    pub tally: Tally,
}

impl AggregatedPart {
    fn new(part: &Part) -> Self {
        Self {
            kind: part.kind(),
            responses: 0,
            invalid: 0,
            tally: Tally::for_kind(part.kind()),
        }
    }

    fn add(&mut self, part: &Part, raw: &Value) {
        match normalize(part, raw) {
            Ok(Some(response)) => {
                self.responses += 1;
                self.tally.record(response);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(kind = %part.kind(), error = %e, "invalid poll response");
                self.invalid += 1;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoll {
    pub poll_id: String,
    pub submissions: usize,
    pub parts: Vec<AggregatedPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSurvey {
    pub survey_id: String,
    pub submissions: usize,
    pub polls: Vec<AggregatedPoll>,
}

/// Tally every submission for `poll`.
pub fn aggregate_poll(
    poll: &Poll,
    submissions: &[PollSubmission],
) -> Result<AggregatedPoll, AssessmentError> {
    aggregate_refs(poll, submissions.iter())
}

fn aggregate_refs<'a>(
    poll: &Poll,
    submissions: impl Iterator<Item = &'a PollSubmission>,
) -> Result<AggregatedPoll, AssessmentError> {
    let mut parts: Vec<AggregatedPart> = poll.parts.iter().map(AggregatedPart::new).collect();
    let mut count = 0;

    for submission in submissions {
        if submission.poll_id != poll.id {
            return Err(AssessmentError::UnknownIdentifier(submission.poll_id.clone()));
        }
        if submission.parts.len() != poll.parts.len() {
            return Err(AssessmentError::PartCountMismatch {
                id: poll.id.clone(),
                expected: poll.parts.len(),
                found: submission.parts.len(),
            });
        }
        for ((aggregated, part), raw) in parts.iter_mut().zip(&poll.parts).zip(&submission.parts) {
            aggregated.add(part, raw);
        }
        count += 1;
    }

    Ok(AggregatedPoll {
        poll_id: poll.id.clone(),
        submissions: count,
        parts,
    })
}

/// Tally every submission for `survey`, poll by poll.
pub fn aggregate_survey(
    survey: &Survey,
    submissions: &[SurveySubmission],
) -> Result<AggregatedSurvey, AssessmentError> {
    for submission in submissions {
        if submission.survey_id != survey.id {
            return Err(AssessmentError::UnknownIdentifier(submission.survey_id.clone()));
        }
        if let Some(stray) = submission
            .polls
            .iter()
            .find(|p| survey.poll(&p.poll_id).is_none())
        {
            return Err(AssessmentError::QuestionNotInSet {
                container_id: survey.id.clone(),
                question_id: stray.poll_id.clone(),
            });
        }
    }

    let polls = survey
        .polls
        .iter()
        .map(|poll| {
            let answers = submissions
                .iter()
                .flat_map(|s| s.polls.iter())
                .filter(|p| p.poll_id == poll.id);
            aggregate_refs(poll, answers)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AggregatedSurvey {
        survey_id: survey.id.clone(),
        submissions: submissions.len(),
        polls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PartBody;
    use serde_json::json;

    fn poll() -> Poll {
        Poll {
            id: "p-lunch".into(),
            content: "Lunch".into(),
            parts: vec![
                Part::new(PartBody::MultipleChoice {
                    choices: vec!["pizza".into(), "salad".into()],
                }),
                Part::new(PartBody::FreeResponse),
                Part::new(PartBody::Matching {
                    labels: vec!["mon".into(), "tue".into()],
                    values: vec!["in".into(), "out".into()],
                }),
            ],
        }
    }

    fn answer(choice: Value, text: Value, pairs: Value) -> PollSubmission {
        PollSubmission {
            poll_id: "p-lunch".into(),
            parts: vec![choice, text, pairs],
        }
    }

    #[test]
    fn tallies_by_kind() {
        let submissions = vec![
            answer(json!("pizza"), json!("More Pizza"), json!(["in", "out"])),
            answer(json!(0), json!("more pizza"), json!(["in", "in"])),
            answer(json!("salad"), Value::Null, json!({"tue": "out"})),
            answer(json!(true), json!("ok"), Value::Null),
        ];
        let aggregated = aggregate_poll(&poll(), &submissions).unwrap();
        assert_eq!(aggregated.submissions, 4);

        let choice = &aggregated.parts[0];
        assert_eq!(choice.responses, 3);
        assert_eq!(choice.invalid, 1);
        assert_eq!(
            choice.tally,
            Tally::Choices {
                counts: BTreeMap::from([(0, 2), (1, 1)])
            }
        );

        let text = &aggregated.parts[1];
        // Null free response normalizes to an empty answer.
        assert_eq!(
            text.tally,
            Tally::Text {
                counts: BTreeMap::from([
                    ("".to_string(), 1),
                    ("more pizza".to_string(), 2),
                    ("ok".to_string(), 1)
                ])
            }
        );

        let pairs = &aggregated.parts[2];
        assert_eq!(pairs.responses, 3);
        assert_eq!(
            pairs.tally,
            Tally::Pairs {
                counts: vec![
                    PairCount { label: 0, value: 0, count: 2 },
                    PairCount { label: 1, value: 0, count: 1 },
                    PairCount { label: 1, value: 1, count: 2 },
                ]
            }
        );
    }

    #[test]
    fn wrong_poll_or_part_count_is_rejected() {
        let stray = PollSubmission {
            poll_id: "other".into(),
            parts: vec![],
        };
        assert!(matches!(
            aggregate_poll(&poll(), &[stray]),
            Err(AssessmentError::UnknownIdentifier(_))
        ));

        let short = PollSubmission {
            poll_id: "p-lunch".into(),
            parts: vec![json!(0)],
        };
        assert!(matches!(
            aggregate_poll(&poll(), &[short]),
            Err(AssessmentError::PartCountMismatch { expected: 3, found: 1, .. })
        ));
    }

    #[test]
    fn survey_groups_by_poll() {
        let second = Poll {
            id: "p-drink".into(),
            content: String::new(),
            parts: vec![Part::new(PartBody::MultipleAnswer {
                choices: vec!["tea".into(), "coffee".into(), "water".into()],
            })],
        };
        let survey = Survey {
            id: "s-food".into(),
            title: String::new(),
            polls: vec![poll(), second],
        };
        let submissions = vec![
            SurveySubmission {
                survey_id: "s-food".into(),
                polls: vec![
                    answer(json!(1), json!("x"), Value::Null),
                    PollSubmission {
                        poll_id: "p-drink".into(),
                        parts: vec![json!(["tea", "water"])],
                    },
                ],
            },
            SurveySubmission {
                survey_id: "s-food".into(),
                polls: vec![PollSubmission {
                    poll_id: "p-drink".into(),
                    parts: vec![json!([2])],
                }],
            },
        ];
        let aggregated = aggregate_survey(&survey, &submissions).unwrap();
        assert_eq!(aggregated.submissions, 2);
        assert_eq!(aggregated.polls[0].submissions, 1);
        assert_eq!(aggregated.polls[1].submissions, 2);
        assert_eq!(
            aggregated.polls[1].parts[0].tally,
            Tally::Choices {
                counts: BTreeMap::from([(0, 1), (2, 2)])
            }
        );

        let stray = SurveySubmission {
            survey_id: "s-food".into(),
            polls: vec![PollSubmission {
                poll_id: "p-unknown".into(),
                parts: vec![],
            }],
        };
        assert!(matches!(
            aggregate_survey(&survey, &[stray]),
            Err(AssessmentError::QuestionNotInSet { .. })
        ));
    }
}
