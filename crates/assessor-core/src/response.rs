//! Typed responses and the normalizer that produces them from raw
//! submitted JSON values.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NormalizationError;
use crate::model::{Part, PartBody, PartKind, WordBank};

/// A submitted answer, normalized to the shape its part expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Response {
    Text(String),
    Index(usize),
    Indices(Vec<usize>),
    /// Label index to value index.
    Connections(BTreeMap<usize, usize>),
    /// Blank id to the text or word ids filled in.
    Blanks(BTreeMap<String, BlankValue>),
    File(FileRef),
    ModeledContent(Vec<String>),
}

impl Response {
    pub fn kind(&self) -> ResponseKind {
        match self {
            Response::Text(_) => ResponseKind::Text,
            Response::Index(_) => ResponseKind::Index,
            Response::Indices(_) => ResponseKind::Indices,
            Response::Connections(_) => ResponseKind::Connections,
            Response::Blanks(_) => ResponseKind::Blanks,
            Response::File(_) => ResponseKind::File,
            Response::ModeledContent(_) => ResponseKind::ModeledContent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Text,
    Index,
    Indices,
    Connections,
    Blanks,
    File,
    ModeledContent,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseKind::Text => "text",
            ResponseKind::Index => "index",
            ResponseKind::Indices => "indices",
            ResponseKind::Connections => "connections",
            ResponseKind::Blanks => "blanks",
            ResponseKind::File => "file",
            ResponseKind::ModeledContent => "modeled_content",
        };
        f.write_str(name)
    }
}

/// The content of one blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlankValue {
    Text(String),
    Words(Vec<String>),
}

impl BlankValue {
    /// The word ids of this blank; a text blank counts as a single word.
    pub fn words(&self) -> Vec<&str> {
        match self {
            BlankValue::Text(t) => vec![t.as_str()],
            BlankValue::Words(w) => w.iter().map(String::as_str).collect(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            BlankValue::Text(t) => Some(t),
            BlankValue::Words(_) => None,
        }
    }
}

/// Reference to an uploaded file. The bytes live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Convert a raw submitted value into the typed response for `part`.
///
/// `Ok(None)` means the part was left unanswered.
pub fn normalize(part: &Part, raw: &Value) -> Result<Option<Response>, NormalizationError> {
    let kind = part.kind();
    match &part.body {
        PartBody::MultipleChoice { choices } => match raw {
            Value::Null => Ok(None),
            other => choice_index(choices, other, kind).map(|i| Some(Response::Index(i))),
        },
        PartBody::MultipleAnswer { choices } => {
            let mut indices = match raw {
                Value::Null => Vec::new(),
                Value::Array(items) => items
                    .iter()
                    .map(|item| choice_index(choices, item, kind))
                    .collect::<Result<Vec<_>, _>>()?,
                other => vec![choice_index(choices, other, kind)?],
            };
            indices.sort_unstable();
            indices.dedup();
            Ok(Some(Response::Indices(indices)))
        }
        PartBody::Matching { labels, values } | PartBody::Ordering { labels, values } => {
            normalize_connections(kind, labels, values, raw)
        }
        PartBody::FreeResponse => match raw {
            Value::Null => Ok(Some(Response::Text(String::new()))),
            other => scalar_text(other, kind).map(|t| Some(Response::Text(t.to_lowercase()))),
        },
        PartBody::NumericMath | PartBody::SymbolicMath => match raw {
            Value::Null => Ok(None),
            other => scalar_text(other, kind).map(|t| Some(Response::Text(t))),
        },
        PartBody::FillInTheBlankShortAnswer { .. } => match raw {
            Value::Null => Ok(None),
            Value::Object(map) => {
                let mut blanks = BTreeMap::new();
                for (id, value) in map {
                    if value.is_null() {
                        continue;
                    }
                    blanks.insert(id.clone(), BlankValue::Text(scalar_text(value, kind)?));
                }
                Ok(Some(Response::Blanks(blanks)))
            }
            other => Err(wrong_shape(kind, "an object of blank texts", other)),
        },
        PartBody::FillInTheBlankWordBank { word_bank, .. } => match raw {
            Value::Null => Ok(None),
            Value::Object(map) => normalize_word_blanks(kind, word_bank, map).map(Some),
            other => Err(wrong_shape(kind, "an object of blank word ids", other)),
        },
        PartBody::File {
            allowed_mime_types,
            allowed_extensions,
            max_file_size,
        } => match raw {
            Value::Null => Ok(None),
            other => {
                let file = file_ref(kind, other)?;
                check_file(&file, allowed_mime_types, allowed_extensions, *max_file_size)?;
                Ok(Some(Response::File(file)))
            }
        },
        PartBody::ModeledContent => match raw {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(Response::ModeledContent(vec![s.clone()]))),
            Value::Array(items) => items
                .iter()
                .map(|item| scalar_text(item, kind))
                .collect::<Result<Vec<_>, _>>()
                .map(|body| Some(Response::ModeledContent(body))),
            other => Err(wrong_shape(kind, "a text body", other)),
        },
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn wrong_shape(kind: PartKind, expected: &'static str, found: &Value) -> NormalizationError {
    NormalizationError::WrongShape {
        kind,
        expected,
        found: json_type(found),
    }
}

fn scalar_text(value: &Value, kind: PartKind) -> Result<String, NormalizationError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(wrong_shape(kind, "text", other)),
    }
}

fn number_index(n: &serde_json::Number) -> Result<usize, NormalizationError> {
    n.as_u64()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| NormalizationError::InvalidIndex(n.to_string()))
}

/// Resolve a submitted choice to its zero-based index.
///
/// Literal choice text wins. Otherwise a numeric string is read as an index,
/// even when some other choice's literal text is that same number.
fn choice_index(
    choices: &[String],
    value: &Value,
    kind: PartKind,
) -> Result<usize, NormalizationError> {
    match value {
        Value::Number(n) => number_index(n),
        Value::String(s) => {
            if let Some(index) = choices.iter().position(|c| c == s) {
                return Ok(index);
            }
            s.trim()
                .parse::<usize>()
                .map_err(|_| NormalizationError::UnknownChoice(s.clone()))
        }
        other => Err(wrong_shape(kind, "a choice index or choice text", other)),
    }
}

fn normalize_connections(
    kind: PartKind,
    labels: &[String],
    values: &[String],
    raw: &Value,
) -> Result<Option<Response>, NormalizationError> {
    let mut connections = BTreeMap::new();
    match raw {
        Value::Null => return Ok(None),
        Value::Array(items) => {
            for (label, item) in items.iter().enumerate() {
                connections.insert(label, choice_index(values, item, kind)?);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let label = match labels.iter().position(|l| l == key) {
                    Some(index) => index,
                    None => key
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| NormalizationError::UnknownConnectionKey(key.clone()))?,
                };
                connections.insert(label, choice_index(values, item, kind)?);
            }
        }
        other => return Err(wrong_shape(kind, "an object or array of connections", other)),
    }
    Ok(Some(Response::Connections(connections)))
}

fn normalize_word_blanks(
    kind: PartKind,
    bank: &WordBank,
    map: &serde_json::Map<String, Value>,
) -> Result<Response, NormalizationError> {
    let mut blanks = BTreeMap::new();
    let mut used = HashSet::new();
    for (id, value) in map {
        let words = match value {
            Value::Null => continue,
            Value::Array(items) => items
                .iter()
                .map(|item| scalar_text(item, kind))
                .collect::<Result<Vec<_>, _>>()?,
            other => vec![scalar_text(other, kind)?],
        };
        for wid in &words {
            if !bank.contains(wid) {
                return Err(NormalizationError::UnknownWord { wid: wid.clone() });
            }
            if bank.unique && !used.insert(wid.clone()) {
                return Err(NormalizationError::DuplicateWord { wid: wid.clone() });
            }
        }
        blanks.insert(id.clone(), BlankValue::Words(words));
    }
    Ok(Response::Blanks(blanks))
}

fn file_ref(kind: PartKind, value: &Value) -> Result<FileRef, NormalizationError> {
    match value {
        Value::String(name) => Ok(FileRef {
            filename: name.clone(),
            content_type: None,
            size: None,
        }),
        Value::Object(_) => serde_json::from_value(value.clone())
            .map_err(|_| wrong_shape(kind, "a file reference with a filename", value)),
        other => Err(wrong_shape(kind, "a file reference", other)),
    }
}

fn check_file(
    file: &FileRef,
    mime_types: &[String],
    extensions: &[String],
    max_size: Option<u64>,
) -> Result<(), NormalizationError> {
    if let (Some(max), Some(size)) = (max_size, file.size) {
        if size > max {
            return Err(NormalizationError::FileRejected(format!(
                "{} is {size} bytes, limit is {max}",
                file.filename
            )));
        }
    }

    if !extensions.is_empty() && !extensions.iter().any(|e| e == "*") {
        let ext = file
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        let allowed = extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&ext));
        if !allowed {
            return Err(NormalizationError::FileRejected(format!(
                "extension of {} is not allowed",
                file.filename
            )));
        }
    }

    if !mime_types.is_empty() {
        let content_type = file.content_type.as_deref().unwrap_or_default();
        let allowed = mime_types.iter().any(|allowed| mime_matches(allowed, content_type));
        if !allowed {
            return Err(NormalizationError::FileRejected(format!(
                "content type {content_type:?} is not allowed"
            )));
        }
    }

    Ok(())
}

/// `*/*` and `type/*` wildcards are honored.
fn mime_matches(allowed: &str, actual: &str) -> bool {
    if allowed == "*/*" || allowed.eq_ignore_ascii_case(actual) {
        return true;
    }
    match (allowed.split_once('/'), actual.split_once('/')) {
        (Some((major, "*")), Some((actual_major, _))) => major.eq_ignore_ascii_case(actual_major),
        _ => false,
    }
}
