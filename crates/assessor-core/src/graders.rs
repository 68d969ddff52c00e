//! Per-kind grading algorithms.
//!
//! A grader scores one response against one solution in `[0.0, 1.0]`. The
//! solution weight is applied by the registry, not here. A grader handed a
//! solution or response of a shape it does not grade scores 0.0; the registry
//! only pairs graders with the shapes they are registered for.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use regex::Regex;

use crate::config::MathSettings;
use crate::math::{self, MathTree};
use crate::model::{Part, PartBody, Solution, SolutionValue};
use crate::random::{part_permutation, unshuffle_connections, unshuffle_indices};
use crate::response::Response;
use crate::units;

/// Everything a grader sees for one solution.
#[derive(Debug, Clone, Copy)]
pub struct GradeInput<'a> {
    pub part: &'a Part,
    pub solution: &'a Solution,
    pub response: &'a Response,
    /// The submitting user's seed, when randomization applies.
    pub seed: Option<u64>,
}

pub trait Grader: Send + Sync {
    fn name(&self) -> &'static str;

    fn grade(&self, input: &GradeInput<'_>) -> f64;
}

fn score(correct: bool) -> f64 {
    if correct {
        1.0
    } else {
        0.0
    }
}

pub struct MultipleChoiceGrader;

impl Grader for MultipleChoiceGrader {
    fn name(&self) -> &'static str {
        "multiple_choice"
    }

    fn grade(&self, input: &GradeInput<'_>) -> f64 {
        match (&input.solution.value, input.response) {
            (SolutionValue::MultipleChoice(expected), Response::Index(submitted)) => {
                score(expected == submitted)
            }
            _ => 0.0,
        }
    }
}

/// Exact set equality; order and duplicates do not matter.
pub struct MultipleAnswerGrader;

impl Grader for MultipleAnswerGrader {
    fn name(&self) -> &'static str {
        "multiple_answer"
    }

    fn grade(&self, input: &GradeInput<'_>) -> f64 {
        match (&input.solution.value, input.response) {
            (SolutionValue::MultipleAnswer(expected), Response::Indices(submitted)) => {
                let expected: BTreeSet<_> = expected.iter().collect();
                let submitted: BTreeSet<_> = submitted.iter().collect();
                score(expected == submitted)
            }
            _ => 0.0,
        }
    }
}

/// Matching and ordering: the whole label→value mapping must match.
pub struct ConnectingGrader;

impl Grader for ConnectingGrader {
    fn name(&self) -> &'static str {
        "connecting"
    }

    fn grade(&self, input: &GradeInput<'_>) -> f64 {
        match (&input.solution.value, input.response) {
            (SolutionValue::Connecting(expected), Response::Connections(submitted)) => {
                score(expected == submitted)
            }
            _ => 0.0,
        }
    }
}

/// Case-insensitive comparison with curly quotes folded to straight ones.
pub struct FreeResponseGrader;

pub fn normalize_free_text(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => '"',
            other => other,
        })
        .collect()
}

impl Grader for FreeResponseGrader {
    fn name(&self) -> &'static str {
        "free_response"
    }

    fn grade(&self, input: &GradeInput<'_>) -> f64 {
        match (&input.solution.value, input.response) {
            (SolutionValue::FreeResponse(expected), Response::Text(submitted)) => {
                score(normalize_free_text(expected) == normalize_free_text(submitted))
            }
            _ => 0.0,
        }
    }
}

/// Numeric and symbolic math, with unit handling.
pub struct MathGrader {
    /// Try a plain numeric comparison before the symbolic comparator.
    numeric: bool,
    legacy_unit_fallback: bool,
    settings: MathSettings,
}

impl MathGrader {
    pub fn numeric(settings: MathSettings, legacy_unit_fallback: bool) -> Self {
        Self {
            numeric: true,
            legacy_unit_fallback,
            settings,
        }
    }

    pub fn symbolic(settings: MathSettings, legacy_unit_fallback: bool) -> Self {
        Self {
            numeric: false,
            legacy_unit_fallback,
            settings,
        }
    }

    fn compare(&self, solution: &str, response: &str) -> bool {
        if self.numeric {
            if let (Some(expected), Some(submitted)) = (plain_number(solution), plain_number(response))
            {
                let tolerance = self.settings.tolerance * expected.abs().max(submitted.abs()).max(1.0);
                return (expected - submitted).abs() <= tolerance;
            }
        }
        let solution = MathTree::parse_or_text(solution, self.settings.max_depth);
        let response = MathTree::parse_or_text(response, self.settings.max_depth);
        math::math_equal(Some(&solution), Some(&response), &self.settings)
    }
}

fn plain_number(text: &str) -> Option<f64> {
    let text = math::normalize_text(units::strip_math_mode(text.trim()));
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl Grader for MathGrader {
    fn name(&self) -> &'static str {
        if self.numeric {
            "numeric_math"
        } else {
            "symbolic_math"
        }
    }

    fn grade(&self, input: &GradeInput<'_>) -> f64 {
        match (&input.solution.value, input.response) {
            (
                SolutionValue::Math {
                    latex,
                    allowed_units,
                },
                Response::Text(submitted),
            ) => score(units::grade_with_units(
                latex,
                submitted,
                allowed_units.as_deref(),
                self.legacy_unit_fallback,
                |s, r| self.compare(s, r),
            )),
            _ => 0.0,
        }
    }
}

/// Every blank's text must fully match its pattern.
pub struct ShortAnswerGrader;

impl Grader for ShortAnswerGrader {
    fn name(&self) -> &'static str {
        "short_answer"
    }

    fn grade(&self, input: &GradeInput<'_>) -> f64 {
        let (SolutionValue::ShortAnswer(patterns), Response::Blanks(blanks)) =
            (&input.solution.value, input.response)
        else {
            return 0.0;
        };
        let all_match = patterns.iter().all(|(blank, pattern)| {
            let Some(text) = blanks.get(blank).and_then(|v| v.text()) else {
                return false;
            };
            match Regex::new(&format!("^(?:{pattern})$")) {
                Ok(re) => re.is_match(text),
                Err(e) => {
                    tracing::warn!(blank = %blank, pattern = %pattern, error = %e, "invalid blank pattern");
                    false
                }
            }
        });
        score(all_match)
    }
}

/// Every blank's word ids must equal the accepted ids for that blank.
pub struct WordBankGrader;

impl Grader for WordBankGrader {
    fn name(&self) -> &'static str {
        "word_bank"
    }

    fn grade(&self, input: &GradeInput<'_>) -> f64 {
        let (SolutionValue::WordBank(expected), Response::Blanks(blanks)) =
            (&input.solution.value, input.response)
        else {
            return 0.0;
        };

        if let PartBody::FillInTheBlankWordBank { word_bank, .. } = &input.part.body {
            if word_bank.unique {
                let mut seen = HashSet::new();
                let reused = blanks
                    .values()
                    .flat_map(|v| v.words())
                    .any(|wid| !seen.insert(wid));
                if reused {
                    return 0.0;
                }
            }
        }

        let all_match = expected.iter().all(|(blank, accepted)| {
            let Some(value) = blanks.get(blank) else {
                return false;
            };
            let accepted: BTreeSet<&str> = accepted.iter().map(String::as_str).collect();
            let submitted: BTreeSet<&str> = value.words().into_iter().collect();
            accepted == submitted
        });
        score(all_match)
    }
}

/// Maps a randomized part's display-order response back to canonical order,
/// then delegates.
pub struct RandomizedGrader {
    inner: Arc<dyn Grader>,
}

impl RandomizedGrader {
    pub fn new(inner: Arc<dyn Grader>) -> Self {
        Self { inner }
    }
}

/// Translate a display-order response to canonical order. `None` when an
/// index falls outside the part.
pub fn unshuffle_response(part: &Part, response: &Response, seed: u64) -> Option<Response> {
    let Some(perm) = part_permutation(part, seed) else {
        return Some(response.clone());
    };
    match response {
        Response::Index(i) => perm.to_original(*i).map(Response::Index),
        Response::Indices(indices) => unshuffle_indices(&perm, indices).map(Response::Indices),
        Response::Connections(map) => {
            unshuffle_connections(&perm, map).map(Response::Connections)
        }
        other => Some(other.clone()),
    }
}

impl Grader for RandomizedGrader {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn grade(&self, input: &GradeInput<'_>) -> f64 {
        let Some(seed) = input.seed else {
            return self.inner.grade(input);
        };
        match unshuffle_response(input.part, input.response, seed) {
            Some(canonical) => {
                tracing::debug!(
                    grader = self.inner.name(),
                    shuffled = ?input.response,
                    canonical = ?canonical,
                    "unshuffled response"
                );
                self.inner.grade(&GradeInput {
                    response: &canonical,
                    ..*input
                })
            }
            None => {
                tracing::debug!(response = ?input.response, "response index outside part");
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{WordBank, WordEntry};
    use crate::random::Permutation;
    use crate::response::BlankValue;
    use std::collections::BTreeMap;

    fn grade(grader: &dyn Grader, part: &Part, response: &Response) -> f64 {
        grader.grade(&GradeInput {
            part,
            solution: &part.solutions[0],
            response,
            seed: None,
        })
    }

    fn mc_part(answer: usize) -> Part {
        Part::new(PartBody::MultipleChoice {
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        })
        .with_solution(Solution::new(SolutionValue::MultipleChoice(answer)))
    }

    #[test]
    fn multiple_choice() {
        let part = mc_part(2);
        assert_eq!(grade(&MultipleChoiceGrader, &part, &Response::Index(2)), 1.0);
        assert_eq!(grade(&MultipleChoiceGrader, &part, &Response::Index(1)), 0.0);
        assert_eq!(
            grade(&MultipleChoiceGrader, &part, &Response::Text("c".into())),
            0.0
        );
    }

    #[test]
    fn multiple_answer_ignores_order() {
        let part = Part::new(PartBody::MultipleAnswer {
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        })
        .with_solution(Solution::new(SolutionValue::MultipleAnswer(vec![1, 3])));
        assert_eq!(grade(&MultipleAnswerGrader, &part, &Response::Indices(vec![3, 1])), 1.0);
        assert_eq!(grade(&MultipleAnswerGrader, &part, &Response::Indices(vec![1, 3])), 1.0);
        assert_eq!(grade(&MultipleAnswerGrader, &part, &Response::Indices(vec![1, 2])), 0.0);
        assert_eq!(grade(&MultipleAnswerGrader, &part, &Response::Indices(vec![1])), 0.0);
    }

    #[test]
    fn connecting_is_all_or_nothing() {
        let solution = BTreeMap::from([(0, 1), (1, 0), (2, 2)]);
        let part = Part::new(PartBody::Matching {
            labels: vec!["x".into(), "y".into(), "z".into()],
            values: vec!["1".into(), "2".into(), "3".into()],
        })
        .with_solution(Solution::new(SolutionValue::Connecting(solution.clone())));
        assert_eq!(grade(&ConnectingGrader, &part, &Response::Connections(solution)), 1.0);
        let partial = BTreeMap::from([(0, 1), (1, 2), (2, 0)]);
        assert_eq!(grade(&ConnectingGrader, &part, &Response::Connections(partial)), 0.0);
    }

    #[test]
    fn free_response_normalization() {
        let part = Part::new(PartBody::FreeResponse).with_solution(Solution::new(
            SolutionValue::FreeResponse("Don't panic".into()),
        ));
        for text in ["don't panic", "DON\u{2019}T PANIC", "  don't panic "] {
            assert_eq!(
                grade(&FreeResponseGrader, &part, &Response::Text(text.into())),
                1.0,
                "{text}"
            );
        }
        assert_eq!(
            grade(&FreeResponseGrader, &part, &Response::Text("panic".into())),
            0.0
        );
    }

    #[test]
    fn numeric_math_with_units() {
        let part = Part::new(PartBody::NumericMath).with_solution(Solution::new(
            SolutionValue::math_with_units("5", &["cm", ""]),
        ));
        let grader = MathGrader::numeric(MathSettings::default(), true);
        for text in ["5", "5 cm", "5cm", "5.0", "$5$"] {
            assert_eq!(grade(&grader, &part, &Response::Text(text.into())), 1.0, "{text}");
        }
        assert_eq!(grade(&grader, &part, &Response::Text("5 in".into())), 0.0);
        assert_eq!(grade(&grader, &part, &Response::Text("6 cm".into())), 0.0);
    }

    #[test]
    fn numeric_math_accepts_equivalent_forms() {
        let part = Part::new(PartBody::NumericMath)
            .with_solution(Solution::new(SolutionValue::math("0.5")));
        let grader = MathGrader::numeric(MathSettings::default(), false);
        assert_eq!(grade(&grader, &part, &Response::Text("\\frac{1}{2}".into())), 1.0);
        assert_eq!(grade(&grader, &part, &Response::Text("1/2".into())), 1.0);
        assert_eq!(grade(&grader, &part, &Response::Text("".into())), 0.0);
    }

    #[test]
    fn symbolic_math() {
        let part = Part::new(PartBody::SymbolicMath)
            .with_solution(Solution::new(SolutionValue::math("$2(x+1)$")));
        let grader = MathGrader::symbolic(MathSettings::default(), true);
        assert_eq!(grade(&grader, &part, &Response::Text("2x+2".into())), 1.0);
        assert_eq!(grade(&grader, &part, &Response::Text("2x+1".into())), 0.0);
        assert_eq!(grade(&grader, &part, &Response::Text("\\frac{{".into())), 0.0);
    }

    fn blanks(entries: &[(&str, &str)]) -> Response {
        Response::Blanks(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), BlankValue::Text(v.to_string())))
                .collect(),
        )
    }

    #[test]
    fn short_answer_full_match() {
        let part = Part::new(PartBody::FillInTheBlankShortAnswer {
            input: String::new(),
        })
        .with_solution(Solution::new(SolutionValue::ShortAnswer(BTreeMap::from([
            ("b1".to_string(), "colou?r".to_string()),
            ("b2".to_string(), "[0-9]+".to_string()),
        ]))));
        assert_eq!(
            grade(&ShortAnswerGrader, &part, &blanks(&[("b1", "color"), ("b2", "42")])),
            1.0
        );
        assert_eq!(
            grade(&ShortAnswerGrader, &part, &blanks(&[("b1", "colors"), ("b2", "42")])),
            0.0
        );
        assert_eq!(grade(&ShortAnswerGrader, &part, &blanks(&[("b1", "color")])), 0.0);
    }

    #[test]
    fn short_answer_invalid_pattern_scores_zero() {
        let part = Part::new(PartBody::FillInTheBlankShortAnswer {
            input: String::new(),
        })
        .with_solution(Solution::new(SolutionValue::ShortAnswer(BTreeMap::from([(
            "b1".to_string(),
            "(".to_string(),
        )]))));
        assert_eq!(grade(&ShortAnswerGrader, &part, &blanks(&[("b1", "(")])), 0.0);
    }

    fn word_bank_part(unique: bool) -> Part {
        let entries = ["w1", "w2", "w3"]
            .iter()
            .map(|w| WordEntry {
                wid: w.to_string(),
                word: w.to_uppercase(),
                lang: None,
            })
            .collect();
        Part::new(PartBody::FillInTheBlankWordBank {
            input: String::new(),
            word_bank: WordBank { entries, unique },
        })
        .with_solution(Solution::new(SolutionValue::WordBank(BTreeMap::from([
            ("b1".to_string(), vec!["w1".to_string()]),
            ("b2".to_string(), vec!["w2".to_string(), "w3".to_string()]),
        ]))))
    }

    fn words(entries: &[(&str, &[&str])]) -> Response {
        Response::Blanks(
            entries
                .iter()
                .map(|(k, ws)| {
                    (
                        k.to_string(),
                        BlankValue::Words(ws.iter().map(|w| w.to_string()).collect()),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn word_bank() {
        let part = word_bank_part(false);
        let right = words(&[("b1", &["w1"]), ("b2", &["w3", "w2"])]);
        assert_eq!(grade(&WordBankGrader, &part, &right), 1.0);
        let wrong = words(&[("b1", &["w2"]), ("b2", &["w3", "w2"])]);
        assert_eq!(grade(&WordBankGrader, &part, &wrong), 0.0);
        let missing = words(&[("b1", &["w1"])]);
        assert_eq!(grade(&WordBankGrader, &part, &missing), 0.0);
    }

    #[test]
    fn unique_word_bank_rejects_reuse() {
        let part = word_bank_part(true);
        let reused = words(&[("b1", &["w1"]), ("b2", &["w2", "w3"]), ("b3", &["w1"])]);
        assert_eq!(grade(&WordBankGrader, &part, &reused), 0.0);
        let part = word_bank_part(false);
        assert_eq!(grade(&WordBankGrader, &part, &reused), 1.0);
    }

    #[test]
    fn randomized_grader_unshuffles() {
        let part = mc_part(2).randomized();
        let seed = 100;
        let perm = Permutation::new(seed, false, 4);
        let displayed = perm.to_shuffled(2).unwrap();
        let grader = RandomizedGrader::new(Arc::new(MultipleChoiceGrader));
        let input = |response: &Response| {
            grader.grade(&GradeInput {
                part: &part,
                solution: &part.solutions[0],
                response,
                seed: Some(seed),
            })
        };
        assert_eq!(input(&Response::Index(displayed)), 1.0);
        assert_eq!(input(&Response::Index((displayed + 1) % 4)), 0.0);
        assert_eq!(input(&Response::Index(9)), 0.0);
    }

    #[test]
    fn randomized_grader_without_seed_delegates() {
        let part = mc_part(2).randomized();
        let grader = RandomizedGrader::new(Arc::new(MultipleChoiceGrader));
        assert_eq!(grade(&grader, &part, &Response::Index(2)), 1.0);
    }
}
