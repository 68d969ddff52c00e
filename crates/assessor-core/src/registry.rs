//! Grader dispatch.
//!
//! Graders are looked up by the kinds of part, solution, and response. A
//! separate table holds randomized graders, which are consulted only for
//! randomized parts graded on behalf of a user with a seed.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::GradingConfig;
use crate::error::AssessmentError;
use crate::graders::{
    ConnectingGrader, FreeResponseGrader, GradeInput, Grader, MathGrader, MultipleAnswerGrader,
    MultipleChoiceGrader, RandomizedGrader, ShortAnswerGrader, WordBankGrader,
};
use crate::model::{Part, PartKind, Solution, SolutionKind};
use crate::response::{Response, ResponseKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraderKey {
    pub part: PartKind,
    pub solution: SolutionKind,
    pub response: ResponseKind,
}

impl GraderKey {
    pub fn new(part: PartKind, solution: SolutionKind, response: ResponseKind) -> Self {
        Self {
            part,
            solution,
            response,
        }
    }

    fn of(part: &Part, solution: &Solution, response: &Response) -> Self {
        Self::new(part.kind(), solution.value.kind(), response.kind())
    }
}

#[derive(Default)]
pub struct GraderRegistry {
    plain: HashMap<GraderKey, Arc<dyn Grader>>,
    randomized: HashMap<GraderKey, Arc<dyn Grader>>,
}

impl GraderRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in graders for every gradable part kind, with randomized
    /// variants for the kinds whose display order can be permuted.
    pub fn with_defaults(config: &GradingConfig) -> Self {
        let mut registry = Self::empty();
        let key = GraderKey::new;

        let choice: Arc<dyn Grader> = Arc::new(MultipleChoiceGrader);
        let answers: Arc<dyn Grader> = Arc::new(MultipleAnswerGrader);
        let connecting: Arc<dyn Grader> = Arc::new(ConnectingGrader);

        let shuffleable = [
            (
                key(PartKind::MultipleChoice, SolutionKind::MultipleChoice, ResponseKind::Index),
                choice,
            ),
            (
                key(PartKind::MultipleAnswer, SolutionKind::MultipleAnswer, ResponseKind::Indices),
                answers,
            ),
            (
                key(PartKind::Matching, SolutionKind::Connecting, ResponseKind::Connections),
                connecting.clone(),
            ),
            (
                key(PartKind::Ordering, SolutionKind::Connecting, ResponseKind::Connections),
                connecting,
            ),
        ];
        for (k, grader) in shuffleable {
            registry.register_randomized(k, Arc::new(RandomizedGrader::new(grader.clone())));
            registry.register(k, grader);
        }

        registry.register(
            key(PartKind::FreeResponse, SolutionKind::FreeResponse, ResponseKind::Text),
            Arc::new(FreeResponseGrader),
        );
        registry.register(
            key(PartKind::NumericMath, SolutionKind::Math, ResponseKind::Text),
            Arc::new(MathGrader::numeric(
                config.math.clone(),
                config.legacy_unit_fallback,
            )),
        );
        registry.register(
            key(PartKind::SymbolicMath, SolutionKind::Math, ResponseKind::Text),
            Arc::new(MathGrader::symbolic(
                config.math.clone(),
                config.legacy_unit_fallback,
            )),
        );
        registry.register(
            key(
                PartKind::FillInTheBlankShortAnswer,
                SolutionKind::ShortAnswer,
                ResponseKind::Blanks,
            ),
            Arc::new(ShortAnswerGrader),
        );
        registry.register(
            key(
                PartKind::FillInTheBlankWordBank,
                SolutionKind::WordBank,
                ResponseKind::Blanks,
            ),
            Arc::new(WordBankGrader),
        );
        registry
    }

    pub fn register(&mut self, key: GraderKey, grader: Arc<dyn Grader>) {
        self.plain.insert(key, grader);
    }

    pub fn register_randomized(&mut self, key: GraderKey, grader: Arc<dyn Grader>) {
        self.randomized.insert(key, grader);
    }

    /// Pick the grader for one solution.
    ///
    /// The randomized table is tried first when the part is randomized and a
    /// creator seed is known; otherwise, or when nothing is registered there,
    /// the plain table decides.
    pub fn select(
        &self,
        part: &Part,
        solution: &Solution,
        response: &Response,
        creator: Option<u64>,
    ) -> Option<&dyn Grader> {
        let key = GraderKey::of(part, solution, response);
        if part.randomized && creator.is_some() {
            if let Some(grader) = self.randomized.get(&key) {
                tracing::debug!(?key, grader = grader.name(), "selected randomized grader");
                return Some(grader.as_ref());
            }
        }
        let grader = self.plain.get(&key)?;
        tracing::debug!(?key, grader = grader.name(), "selected grader");
        Some(grader.as_ref())
    }

    /// Score a response against a part's solutions.
    ///
    /// Solutions are tried in order; the first non-zero result, times that
    /// solution's weight, is the score. No match scores 0.0. A part without
    /// solutions has no opinion (`None`).
    pub fn grade_part(
        &self,
        part: &Part,
        response: &Response,
        creator: Option<u64>,
    ) -> Result<Option<f64>, AssessmentError> {
        if part.solutions.is_empty() {
            return Ok(None);
        }
        for solution in &part.solutions {
            let grader = self.select(part, solution, response, creator).ok_or_else(|| {
                AssessmentError::UnregisteredGrader {
                    part: part.kind(),
                    solution: solution.value.kind(),
                    response: response.kind(),
                }
            })?;
            let result = grader.grade(&GradeInput {
                part,
                solution,
                response,
                seed: creator,
            });
            if result != 0.0 {
                return Ok(Some(solution.weight * result));
            }
        }
        Ok(Some(0.0))
    }
}
