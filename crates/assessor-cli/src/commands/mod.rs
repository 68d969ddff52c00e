pub mod aggregate;
pub mod compare;
pub mod draw;
pub mod grade;
pub mod init;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Read and parse a JSON input file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse JSON: {}", path.display()))
}

/// Format an optional score as a percentage.
pub fn percent(score: Option<f64>) -> String {
    score
        .map(|s| format!("{:.1}%", s * 100.0))
        .unwrap_or_else(|| "-".to_string())
}
