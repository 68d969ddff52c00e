//! Core content model types for assessor.
//!
//! Questions are made of parts; parts carry their kind-specific display data
//! and an ordered list of solutions. Sets, banks, polls, and surveys are plain
//! containers over questions. Everything here is immutable once graded.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of part kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    MultipleChoice,
    MultipleAnswer,
    Matching,
    Ordering,
    FreeResponse,
    NumericMath,
    SymbolicMath,
    FillInTheBlankShortAnswer,
    FillInTheBlankWordBank,
    File,
    ModeledContent,
}

impl PartKind {
    /// Whether parts of this kind can be scored automatically.
    ///
    /// File uploads and modeled (essay) content await manual review and are
    /// assessed as `None` by design.
    pub fn is_gradable(self) -> bool {
        !matches!(self, PartKind::File | PartKind::ModeledContent)
    }

    /// Whether the display order of this kind can be permuted per user.
    pub fn is_randomizable(self) -> bool {
        matches!(
            self,
            PartKind::MultipleChoice
                | PartKind::MultipleAnswer
                | PartKind::Matching
                | PartKind::Ordering
        )
    }

    /// The solution kind every solution of such a part must have.
    pub fn solution_kind(self) -> Option<SolutionKind> {
        match self {
            PartKind::MultipleChoice => Some(SolutionKind::MultipleChoice),
            PartKind::MultipleAnswer => Some(SolutionKind::MultipleAnswer),
            PartKind::Matching | PartKind::Ordering => Some(SolutionKind::Connecting),
            PartKind::FreeResponse => Some(SolutionKind::FreeResponse),
            PartKind::NumericMath | PartKind::SymbolicMath => Some(SolutionKind::Math),
            PartKind::FillInTheBlankShortAnswer => Some(SolutionKind::ShortAnswer),
            PartKind::FillInTheBlankWordBank => Some(SolutionKind::WordBank),
            PartKind::File | PartKind::ModeledContent => None,
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartKind::MultipleChoice => "multiple_choice",
            PartKind::MultipleAnswer => "multiple_answer",
            PartKind::Matching => "matching",
            PartKind::Ordering => "ordering",
            PartKind::FreeResponse => "free_response",
            PartKind::NumericMath => "numeric_math",
            PartKind::SymbolicMath => "symbolic_math",
            PartKind::FillInTheBlankShortAnswer => "fill_in_the_blank_short_answer",
            PartKind::FillInTheBlankWordBank => "fill_in_the_blank_word_bank",
            PartKind::File => "file",
            PartKind::ModeledContent => "modeled_content",
        };
        f.write_str(name)
    }
}

impl FromStr for PartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "multiple_choice" | "mc" => Ok(PartKind::MultipleChoice),
            "multiple_answer" | "multiple_choice_multiple_answer" => {
                Ok(PartKind::MultipleAnswer)
            }
            "matching" => Ok(PartKind::Matching),
            "ordering" => Ok(PartKind::Ordering),
            "free_response" => Ok(PartKind::FreeResponse),
            "numeric_math" => Ok(PartKind::NumericMath),
            "symbolic_math" | "math" => Ok(PartKind::SymbolicMath),
            "fill_in_the_blank_short_answer" | "short_answer" => {
                Ok(PartKind::FillInTheBlankShortAnswer)
            }
            "fill_in_the_blank_word_bank" | "word_bank" => Ok(PartKind::FillInTheBlankWordBank),
            "file" => Ok(PartKind::File),
            "modeled_content" | "essay" => Ok(PartKind::ModeledContent),
            other => Err(format!("unknown part kind: {other}")),
        }
    }
}

/// The closed set of solution shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionKind {
    MultipleChoice,
    MultipleAnswer,
    Connecting,
    FreeResponse,
    Math,
    ShortAnswer,
    WordBank,
}

impl fmt::Display for SolutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolutionKind::MultipleChoice => "multiple_choice",
            SolutionKind::MultipleAnswer => "multiple_answer",
            SolutionKind::Connecting => "connecting",
            SolutionKind::FreeResponse => "free_response",
            SolutionKind::Math => "math",
            SolutionKind::ShortAnswer => "short_answer",
            SolutionKind::WordBank => "word_bank",
        };
        f.write_str(name)
    }
}

/// Kind-specific display data of a part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartBody {
    MultipleChoice {
        choices: Vec<String>,
    },
    MultipleAnswer {
        choices: Vec<String>,
    },
    Matching {
        labels: Vec<String>,
        values: Vec<String>,
    },
    Ordering {
        labels: Vec<String>,
        values: Vec<String>,
    },
    FreeResponse,
    NumericMath,
    SymbolicMath,
    FillInTheBlankShortAnswer {
        #[serde(default)]
        input: String,
    },
    FillInTheBlankWordBank {
        #[serde(default)]
        input: String,
        word_bank: WordBank,
    },
    File {
        #[serde(default)]
        allowed_mime_types: Vec<String>,
        #[serde(default)]
        allowed_extensions: Vec<String>,
        #[serde(default)]
        max_file_size: Option<u64>,
    },
    ModeledContent,
}

impl PartBody {
    pub fn kind(&self) -> PartKind {
        match self {
            PartBody::MultipleChoice { .. } => PartKind::MultipleChoice,
            PartBody::MultipleAnswer { .. } => PartKind::MultipleAnswer,
            PartBody::Matching { .. } => PartKind::Matching,
            PartBody::Ordering { .. } => PartKind::Ordering,
            PartBody::FreeResponse => PartKind::FreeResponse,
            PartBody::NumericMath => PartKind::NumericMath,
            PartBody::SymbolicMath => PartKind::SymbolicMath,
            PartBody::FillInTheBlankShortAnswer { .. } => PartKind::FillInTheBlankShortAnswer,
            PartBody::FillInTheBlankWordBank { .. } => PartKind::FillInTheBlankWordBank,
            PartBody::File { .. } => PartKind::File,
            PartBody::ModeledContent => PartKind::ModeledContent,
        }
    }
}

/// A word bank shared by the blanks of a fill-in-the-blank part.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WordBank {
    #[serde(default)]
    pub entries: Vec<WordEntry>,
    /// When set, one word id may fill at most one blank per submission.
    #[serde(default)]
    pub unique: bool,
}

impl WordBank {
    pub fn contains(&self, wid: &str) -> bool {
        self.entries.iter().any(|e| e.wid == wid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordEntry {
    pub wid: String,
    pub word: String,
    #[serde(default)]
    pub lang: Option<String>,
}

/// One gradable question unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Display text.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub explanation: String,
    /// Permute the choice/value order per user.
    #[serde(default)]
    pub randomized: bool,
    /// Pass the user seed through SHA-256 before building the generator.
    #[serde(default)]
    pub high_entropy: bool,
    pub body: PartBody,
    /// Candidate answers, tried in order.
    #[serde(default)]
    pub solutions: Vec<Solution>,
}

impl Part {
    /// A part with the given body and no display text or solutions.
    pub fn new(body: PartBody) -> Self {
        Self {
            content: String::new(),
            hints: Vec::new(),
            explanation: String::new(),
            randomized: false,
            high_entropy: false,
            body,
            solutions: Vec::new(),
        }
    }

    pub fn with_solution(mut self, solution: Solution) -> Self {
        self.solutions.push(solution);
        self
    }

    pub fn randomized(mut self) -> Self {
        self.randomized = true;
        self
    }

    pub fn kind(&self) -> PartKind {
        self.body.kind()
    }

    /// The choices of a multiple-choice or multiple-answer part.
    pub fn choices(&self) -> Option<&[String]> {
        match &self.body {
            PartBody::MultipleChoice { choices } | PartBody::MultipleAnswer { choices } => {
                Some(choices)
            }
            _ => None,
        }
    }

    /// Whether every solution has the shape the part kind requires.
    pub fn solutions_match_kind(&self) -> bool {
        let expected = self.kind().solution_kind();
        self.solutions
            .iter()
            .all(|s| Some(s.value.kind()) == expected)
    }
}

/// A candidate correct answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Relative correctness in [0.0, 1.0] when this solution is matched.
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub value: SolutionValue,
}

fn default_weight() -> f64 {
    1.0
}

impl Solution {
    pub fn new(value: SolutionValue) -> Self {
        Self { weight: 1.0, value }
    }

    pub fn weighted(value: SolutionValue, weight: f64) -> Self {
        Self { weight, value }
    }
}

/// Solution values, in canonical (unshuffled) index space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SolutionValue {
    MultipleChoice(usize),
    MultipleAnswer(Vec<usize>),
    /// Label index to value index.
    Connecting(BTreeMap<usize, usize>),
    FreeResponse(String),
    Math {
        latex: String,
        /// `None`: no unit handling. Empty: units forbidden. Otherwise the
        /// accepted suffixes; include `""` to make the unit optional.
        #[serde(default)]
        allowed_units: Option<Vec<String>>,
    },
    /// Blank id to a pattern the whole blank text must match.
    ShortAnswer(BTreeMap<String, String>),
    /// Blank id to the accepted word ids.
    WordBank(BTreeMap<String, Vec<String>>),
}

impl SolutionValue {
    pub fn kind(&self) -> SolutionKind {
        match self {
            SolutionValue::MultipleChoice(_) => SolutionKind::MultipleChoice,
            SolutionValue::MultipleAnswer(_) => SolutionKind::MultipleAnswer,
            SolutionValue::Connecting(_) => SolutionKind::Connecting,
            SolutionValue::FreeResponse(_) => SolutionKind::FreeResponse,
            SolutionValue::Math { .. } => SolutionKind::Math,
            SolutionValue::ShortAnswer(_) => SolutionKind::ShortAnswer,
            SolutionValue::WordBank(_) => SolutionKind::WordBank,
        }
    }

    pub fn math(latex: impl Into<String>) -> Self {
        SolutionValue::Math {
            latex: latex.into(),
            allowed_units: None,
        }
    }

    pub fn math_with_units(latex: impl Into<String>, units: &[&str]) -> Self {
        SolutionValue::Math {
            latex: latex.into(),
            allowed_units: Some(units.iter().map(|u| u.to_string()).collect()),
        }
    }
}

/// A question: an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub content: String,
    pub parts: Vec<Part>,
}

impl Question {
    pub fn new(id: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            id: id.into(),
            content: String::new(),
            parts,
        }
    }

    /// Mark every part whose order can be permuted as randomized.
    pub fn mark_randomized(&mut self) {
        for part in &mut self.parts {
            if part.kind().is_randomizable() {
                part.randomized = true;
            }
        }
    }
}

/// An ordered collection of questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub questions: Vec<Question>,
}

impl QuestionSet {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Turn this set into a randomized set: every randomizable part of every
    /// question is permuted per user.
    pub fn mark_randomized(&mut self) {
        for question in &mut self.questions {
            question.mark_randomized();
        }
    }
}

/// A disjoint slice `[start, end)` of a bank's pool with its own draw count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub start: usize,
    pub end: usize,
    pub draw: usize,
}

impl IndexRange {
    pub fn new(start: usize, end: usize, draw: usize) -> Self {
        Self { start, end, draw }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &IndexRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A question set that shows each user a seeded subset of its pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBank {
    pub set: QuestionSet,
    /// How many questions to draw. `None` shows the whole pool.
    #[serde(default)]
    pub draw: Option<usize>,
    #[serde(default)]
    pub ranges: Vec<IndexRange>,
    #[serde(default)]
    pub high_entropy: bool,
}

impl QuestionBank {
    pub fn id(&self) -> &str {
        &self.set.id
    }
}

/// A non-graded question collecting opinions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    #[serde(default)]
    pub content: String,
    pub parts: Vec<Part>,
}

/// An ordered collection of polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub polls: Vec<Poll>,
}

impl Survey {
    pub fn poll(&self, id: &str) -> Option<&Poll> {
        self.polls.iter().find(|p| p.id == id)
    }
}
