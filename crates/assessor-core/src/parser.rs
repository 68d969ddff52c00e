//! TOML content loader.
//!
//! Loads questions, question sets, question banks, polls, and surveys from
//! TOML files and directories, and validates them.
//!
//! Sets, banks, and surveys refer to questions and polls of the same file by
//! id. Solution values are written the way an author thinks of them (choice
//! text or index, label→value tables) and converted to canonical indices here.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::model::{
    IndexRange, Part, PartBody, PartKind, Poll, Question, QuestionBank, QuestionSet, Solution,
    SolutionValue, Survey, WordBank, WordEntry,
};

/// Intermediate TOML structure for a content file.
#[derive(Debug, Default, Deserialize)]
struct TomlContentFile {
    #[serde(default)]
    questions: Vec<TomlQuestion>,
    #[serde(default)]
    question_sets: Vec<TomlQuestionSet>,
    #[serde(default)]
    question_banks: Vec<TomlQuestionBank>,
    #[serde(default)]
    polls: Vec<TomlQuestion>,
    #[serde(default)]
    surveys: Vec<TomlSurvey>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    parts: Vec<TomlPart>,
}

#[derive(Debug, Deserialize)]
struct TomlPart {
    kind: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    randomized: bool,
    #[serde(default)]
    high_entropy: bool,
    #[serde(default)]
    choices: Vec<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    input: String,
    #[serde(default)]
    words: Vec<TomlWord>,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    allowed_mime_types: Vec<String>,
    #[serde(default)]
    allowed_extensions: Vec<String>,
    #[serde(default)]
    max_file_size: Option<u64>,
    #[serde(default)]
    solutions: Vec<TomlSolution>,
}

#[derive(Debug, Deserialize)]
struct TomlWord {
    wid: String,
    word: String,
    #[serde(default)]
    lang: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlSolution {
    #[serde(default = "default_weight")]
    weight: f64,
    value: toml::Value,
    #[serde(default)]
    allowed_units: Option<Vec<String>>,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct TomlQuestionSet {
    id: String,
    #[serde(default)]
    title: String,
    questions: Vec<String>,
    #[serde(default)]
    randomized: bool,
}

#[derive(Debug, Deserialize)]
struct TomlQuestionBank {
    id: String,
    #[serde(default)]
    title: String,
    questions: Vec<String>,
    #[serde(default)]
    draw: Option<usize>,
    #[serde(default)]
    ranges: Vec<IndexRange>,
    #[serde(default)]
    high_entropy: bool,
}

#[derive(Debug, Deserialize)]
struct TomlSurvey {
    id: String,
    #[serde(default)]
    title: String,
    polls: Vec<String>,
}

/// Everything loaded from one or more content files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentBundle {
    pub questions: Vec<Question>,
    pub question_sets: Vec<QuestionSet>,
    pub question_banks: Vec<QuestionBank>,
    pub polls: Vec<Poll>,
    pub surveys: Vec<Survey>,
}

impl ContentBundle {
    pub fn merge(&mut self, other: ContentBundle) {
        self.questions.extend(other.questions);
        self.question_sets.extend(other.question_sets);
        self.question_banks.extend(other.question_banks);
        self.polls.extend(other.polls);
        self.surveys.extend(other.surveys);
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
            && self.question_sets.is_empty()
            && self.question_banks.is_empty()
            && self.polls.is_empty()
            && self.surveys.is_empty()
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn question_set(&self, id: &str) -> Option<&QuestionSet> {
        self.question_sets.iter().find(|s| s.id == id)
    }

    pub fn question_bank(&self, id: &str) -> Option<&QuestionBank> {
        self.question_banks.iter().find(|b| b.id() == id)
    }

    pub fn poll(&self, id: &str) -> Option<&Poll> {
        self.polls.iter().find(|p| p.id == id)
    }

    pub fn survey(&self, id: &str) -> Option<&Survey> {
        self.surveys.iter().find(|s| s.id == id)
    }
}

/// Parse a single TOML content file.
pub fn load_content_file(path: &Path) -> Result<ContentBundle> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read content file: {}", path.display()))?;

    load_content_str(&content, path)
}

/// Parse TOML content from a string (useful for testing).
pub fn load_content_str(content: &str, source_path: &Path) -> Result<ContentBundle> {
    let parsed: TomlContentFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| convert_question(q).with_context(|| format!("in {}", source_path.display())))
        .collect::<Result<Vec<_>>>()?;

    let polls = parsed
        .polls
        .into_iter()
        .map(|p| {
            let question = convert_question(p)?;
            Ok(Poll {
                id: question.id,
                content: question.content,
                parts: question.parts,
            })
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("in {}", source_path.display()))?;

    let resolve = |set_id: &str, ids: &[String]| -> Result<Vec<Question>> {
        ids.iter()
            .map(|id| {
                questions.iter().find(|q| &q.id == id).cloned().with_context(|| {
                    format!("{set_id} refers to unknown question {id:?}")
                })
            })
            .collect()
    };

    let question_sets = parsed
        .question_sets
        .into_iter()
        .map(|s| {
            let mut set = QuestionSet {
                questions: resolve(&s.id, &s.questions)?,
                id: s.id,
                title: s.title,
            };
            if s.randomized {
                set.mark_randomized();
            }
            Ok(set)
        })
        .collect::<Result<Vec<_>>>()?;

    let question_banks = parsed
        .question_banks
        .into_iter()
        .map(|b| {
            let mut set = QuestionSet {
                questions: resolve(&b.id, &b.questions)?,
                id: b.id,
                title: b.title,
            };
            set.mark_randomized();
            if b.high_entropy {
                for part in set.questions.iter_mut().flat_map(|q| q.parts.iter_mut()) {
                    part.high_entropy = true;
                }
            }
            Ok(QuestionBank {
                set,
                draw: b.draw,
                ranges: b.ranges,
                high_entropy: b.high_entropy,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let surveys = parsed
        .surveys
        .into_iter()
        .map(|s| {
            let polls = s
                .polls
                .iter()
                .map(|id| {
                    polls.iter().find(|p| &p.id == id).cloned().with_context(|| {
                        format!("{} refers to unknown poll {id:?}", s.id)
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Survey {
                id: s.id,
                title: s.title,
                polls,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ContentBundle {
        questions,
        question_sets,
        question_banks,
        polls,
        surveys,
    })
}

fn convert_question(q: TomlQuestion) -> Result<Question> {
    let id = q.id;
    let parts = q
        .parts
        .into_iter()
        .enumerate()
        .map(|(i, p)| convert_part(p).with_context(|| format!("{id} part {i}")))
        .collect::<Result<Vec<_>>>()?;
    Ok(Question {
        id,
        content: q.content,
        parts,
    })
}

fn convert_part(p: TomlPart) -> Result<Part> {
    let kind: PartKind = p.kind.parse().map_err(|e: String| anyhow::anyhow!("{}", e))?;
    let body = match kind {
        PartKind::MultipleChoice => PartBody::MultipleChoice { choices: p.choices },
        PartKind::MultipleAnswer => PartBody::MultipleAnswer { choices: p.choices },
        PartKind::Matching => PartBody::Matching {
            labels: p.labels,
            values: p.values,
        },
        PartKind::Ordering => PartBody::Ordering {
            labels: p.labels,
            values: p.values,
        },
        PartKind::FreeResponse => PartBody::FreeResponse,
        PartKind::NumericMath => PartBody::NumericMath,
        PartKind::SymbolicMath => PartBody::SymbolicMath,
        PartKind::FillInTheBlankShortAnswer => PartBody::FillInTheBlankShortAnswer { input: p.input },
        PartKind::FillInTheBlankWordBank => PartBody::FillInTheBlankWordBank {
            input: p.input,
            word_bank: WordBank {
                entries: p
                    .words
                    .into_iter()
                    .map(|w| WordEntry {
                        wid: w.wid,
                        word: w.word,
                        lang: w.lang,
                    })
                    .collect(),
                unique: p.unique,
            },
        },
        PartKind::File => PartBody::File {
            allowed_mime_types: p.allowed_mime_types,
            allowed_extensions: p.allowed_extensions,
            max_file_size: p.max_file_size,
        },
        PartKind::ModeledContent => PartBody::ModeledContent,
    };

    let mut part = Part::new(body);
    part.content = p.content;
    part.hints = p.hints;
    part.explanation = p.explanation;
    part.randomized = p.randomized;
    part.high_entropy = p.high_entropy;
    part.solutions = p
        .solutions
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let value = convert_solution(&part.body, s.value, s.allowed_units)
                .with_context(|| format!("solution {i}"))?;
            Ok(Solution::weighted(value, s.weight))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(part)
}

fn convert_solution(
    body: &PartBody,
    value: toml::Value,
    allowed_units: Option<Vec<String>>,
) -> Result<SolutionValue> {
    use toml::Value as V;

    Ok(match body {
        PartBody::MultipleChoice { choices } => {
            SolutionValue::MultipleChoice(option_ref(&value, choices, "choice")?)
        }
        PartBody::MultipleAnswer { choices } => {
            let V::Array(items) = value else {
                anyhow::bail!("multiple answer solution must be an array");
            };
            let mut indices = items
                .iter()
                .map(|item| option_ref(item, choices, "choice"))
                .collect::<Result<Vec<_>>>()?;
            indices.sort_unstable();
            indices.dedup();
            SolutionValue::MultipleAnswer(indices)
        }
        PartBody::Matching { labels, values } | PartBody::Ordering { labels, values } => {
            let mut connections = BTreeMap::new();
            match value {
                V::Array(items) => {
                    for (label, item) in items.iter().enumerate() {
                        connections.insert(label, option_ref(item, values, "value")?);
                    }
                }
                V::Table(table) => {
                    for (key, item) in &table {
                        let label = match labels.iter().position(|l| l == key) {
                            Some(i) => i,
                            None => key.parse::<usize>().with_context(|| {
                                format!("unknown label {key:?}")
                            })?,
                        };
                        connections.insert(label, option_ref(item, values, "value")?);
                    }
                }
                _ => anyhow::bail!("connecting solution must be an array or a table"),
            }
            SolutionValue::Connecting(connections)
        }
        PartBody::FreeResponse => match value {
            V::String(text) => SolutionValue::FreeResponse(text),
            _ => anyhow::bail!("free response solution must be a string"),
        },
        PartBody::NumericMath | PartBody::SymbolicMath => {
            let latex = match value {
                V::String(text) => text,
                V::Integer(n) => n.to_string(),
                V::Float(n) => n.to_string(),
                _ => anyhow::bail!("math solution must be a string or a number"),
            };
            SolutionValue::Math {
                latex,
                allowed_units,
            }
        }
        PartBody::FillInTheBlankShortAnswer { .. } => {
            let V::Table(table) = value else {
                anyhow::bail!("short answer solution must be a table of blank patterns");
            };
            let patterns = table
                .into_iter()
                .map(|(blank, pattern)| match pattern {
                    V::String(p) => Ok((blank, p)),
                    _ => anyhow::bail!("pattern for blank {blank:?} must be a string"),
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            SolutionValue::ShortAnswer(patterns)
        }
        PartBody::FillInTheBlankWordBank { .. } => {
            let V::Table(table) = value else {
                anyhow::bail!("word bank solution must be a table of blank word ids");
            };
            let blanks = table
                .into_iter()
                .map(|(blank, words)| {
                    let words = match words {
                        V::String(w) => vec![w],
                        V::Array(items) => items
                            .into_iter()
                            .map(|w| match w {
                                V::String(w) => Ok(w),
                                _ => anyhow::bail!("word ids must be strings"),
                            })
                            .collect::<Result<Vec<_>>>()?,
                        _ => anyhow::bail!("words for blank {blank:?} must be a string or array"),
                    };
                    Ok((blank, words))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            SolutionValue::WordBank(blanks)
        }
        PartBody::File { .. } | PartBody::ModeledContent => {
            anyhow::bail!("{} parts cannot have solutions", body.kind())
        }
    })
}

/// An option given by index or by its text.
fn option_ref(value: &toml::Value, options: &[String], what: &str) -> Result<usize> {
    match value {
        toml::Value::Integer(n) => {
            usize::try_from(*n).with_context(|| format!("{what} index {n} is negative"))
        }
        toml::Value::String(text) => options
            .iter()
            .position(|o| o == text)
            .with_context(|| format!("unknown {what} {text:?}")),
        other => anyhow::bail!("{what} must be an index or text, got {}", other.type_str()),
    }
}

/// Recursively load all `.toml` content files from a directory.
pub fn load_content_dir(dir: &Path) -> Result<ContentBundle> {
    let mut bundle = ContentBundle::default();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            bundle.merge(load_content_dir(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match load_content_file(&path) {
                Ok(content) => bundle.merge(content),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(bundle)
}

/// Load a file or a directory.
pub fn load_content(path: &Path) -> Result<ContentBundle> {
    if path.is_dir() {
        load_content_dir(path)
    } else {
        load_content_file(path)
    }
}

/// A warning from content validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// The item (and part) the warning is about, if any.
    pub item_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn new(item_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item_id: Some(item_id.into()),
            message: message.into(),
        }
    }
}

/// Validate loaded content for authoring mistakes.
pub fn validate_content(bundle: &ContentBundle) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    // Duplicate ids, per namespace. Sets and banks share one: both are
    // targets of set submissions.
    let namespaces: [(&str, Vec<&str>); 4] = [
        ("question", bundle.questions.iter().map(|q| q.id.as_str()).collect()),
        (
            "question set",
            bundle
                .question_sets
                .iter()
                .map(|s| s.id.as_str())
                .chain(bundle.question_banks.iter().map(|b| b.id()))
                .collect(),
        ),
        ("poll", bundle.polls.iter().map(|p| p.id.as_str()).collect()),
        ("survey", bundle.surveys.iter().map(|s| s.id.as_str()).collect()),
    ];
    for (what, ids) in &namespaces {
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(*id) {
                warnings.push(ValidationWarning::new(*id, format!("duplicate {what} id: {id}")));
            }
        }
    }

    let standalone: HashSet<&str> = bundle.questions.iter().map(|q| q.id.as_str()).collect();
    let contained = bundle
        .question_sets
        .iter()
        .chain(bundle.question_banks.iter().map(|b| &b.set))
        .flat_map(|s| s.questions.iter())
        .filter(|q| !standalone.contains(q.id.as_str()));
    for question in bundle.questions.iter().chain(contained) {
        for (i, part) in question.parts.iter().enumerate() {
            validate_part(&format!("{}/part {i}", question.id), part, &mut warnings);
        }
    }
    for poll in &bundle.polls {
        for (i, part) in poll.parts.iter().enumerate() {
            validate_part(&format!("{}/part {i}", poll.id), part, &mut warnings);
        }
    }

    for bank in &bundle.question_banks {
        validate_bank(bank, &mut warnings);
    }

    warnings
}

fn validate_part(item: &str, part: &Part, warnings: &mut Vec<ValidationWarning>) {
    if !part.solutions_match_kind() {
        warnings.push(ValidationWarning::new(
            item,
            format!("solution kind does not match {} part", part.kind()),
        ));
    }

    for solution in &part.solutions {
        if !(0.0..=1.0).contains(&solution.weight) {
            warnings.push(ValidationWarning::new(
                item,
                format!("solution weight {} is outside [0, 1]", solution.weight),
            ));
        }

        match (&solution.value, &part.body) {
            (SolutionValue::MultipleChoice(i), PartBody::MultipleChoice { choices }) => {
                check_index(item, "choice", *i, choices.len(), warnings);
            }
            (SolutionValue::MultipleAnswer(indices), PartBody::MultipleAnswer { choices }) => {
                for &i in indices {
                    check_index(item, "choice", i, choices.len(), warnings);
                }
            }
            (
                SolutionValue::Connecting(map),
                PartBody::Matching { labels, values } | PartBody::Ordering { labels, values },
            ) => {
                for (&label, &value) in map {
                    check_index(item, "label", label, labels.len(), warnings);
                    check_index(item, "value", value, values.len(), warnings);
                }
            }
            (SolutionValue::ShortAnswer(patterns), _) => {
                for (blank, pattern) in patterns {
                    if let Err(e) = Regex::new(&format!("^(?:{pattern})$")) {
                        warnings.push(ValidationWarning::new(
                            item,
                            format!("pattern for blank {blank:?} does not compile: {e}"),
                        ));
                    }
                }
            }
            (
                SolutionValue::WordBank(blanks),
                PartBody::FillInTheBlankWordBank { word_bank, .. },
            ) => {
                for (blank, wids) in blanks {
                    for wid in wids.iter().filter(|w| !word_bank.contains(w)) {
                        warnings.push(ValidationWarning::new(
                            item,
                            format!("blank {blank:?} refers to unknown word id {wid:?}"),
                        ));
                    }
                }
            }
            _ => {}
        }
    }
}

fn check_index(
    item: &str,
    what: &str,
    index: usize,
    len: usize,
    warnings: &mut Vec<ValidationWarning>,
) {
    if index >= len {
        warnings.push(ValidationWarning::new(
            item,
            format!("{what} index {index} out of range (have {len})"),
        ));
    }
}

fn validate_bank(bank: &QuestionBank, warnings: &mut Vec<ValidationWarning>) {
    let pool = bank.set.questions.len();
    for (i, range) in bank.ranges.iter().enumerate() {
        if range.is_empty() || range.end > pool {
            warnings.push(ValidationWarning::new(
                bank.id(),
                format!(
                    "range {}..{} is empty or outside the pool of {pool}",
                    range.start, range.end
                ),
            ));
        }
        if range.draw > range.len() {
            warnings.push(ValidationWarning::new(
                bank.id(),
                format!(
                    "range {}..{} draws {} from {} question(s)",
                    range.start,
                    range.end,
                    range.draw,
                    range.len()
                ),
            ));
        }
        for other in &bank.ranges[i + 1..] {
            if range.overlaps(other) {
                warnings.push(ValidationWarning::new(
                    bank.id(),
                    format!(
                        "ranges {}..{} and {}..{} overlap",
                        range.start, range.end, other.start, other.end
                    ),
                ));
            }
        }
    }
}
