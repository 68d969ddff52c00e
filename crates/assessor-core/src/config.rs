//! Grading configuration.
//!
//! Loaded from `assessor.toml` (or an explicit path) with environment
//! variable overrides on top.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Budgets and tolerances for the symbolic math comparator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathSettings {
    /// Maximum nesting depth for the LaTeX tree and algebraic parsers.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum number of algebraic tokens in one expression.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Maximum evaluation steps for one equivalence check.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Relative tolerance for numeric equality.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Number of deterministic sample points for expressions with variables.
    #[serde(default = "default_sample_points")]
    pub sample_points: usize,
}

fn default_max_depth() -> usize {
    64
}
fn default_max_tokens() -> usize {
    512
}
fn default_max_steps() -> usize {
    20_000
}
fn default_tolerance() -> f64 {
    1e-9
}
fn default_sample_points() -> usize {
    5
}

impl Default for MathSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_tokens: default_max_tokens(),
            max_steps: default_max_steps(),
            tolerance: default_tolerance(),
            sample_points: default_sample_points(),
        }
    }
}

/// Top-level assessor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingConfig {
    /// Retry numeric grading after stripping a trailing token or `\%` when no
    /// unit list is configured. Kept for content authored before unit lists
    /// existed.
    #[serde(default = "default_true")]
    pub legacy_unit_fallback: bool,
    #[serde(default)]
    pub math: MathSettings,
    /// Max concurrent submissions in the batch engine.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

fn default_true() -> bool {
    true
}
fn default_parallelism() -> usize {
    4
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            legacy_unit_fallback: true,
            math: MathSettings::default(),
            parallelism: default_parallelism(),
        }
    }
}

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "assessor.toml";

/// Load configuration from `path`, falling back to `./assessor.toml` and then
/// to defaults. Environment overrides are applied last.
pub fn load_config(path: Option<&Path>) -> Result<GradingConfig> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            local.exists().then_some(local)
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<GradingConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => GradingConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

fn apply_env_overrides(
    config: &mut GradingConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(value) = lookup("ASSESSOR_LEGACY_UNIT_FALLBACK") {
        config.legacy_unit_fallback = parse_flag(&value).with_context(|| {
            format!("invalid ASSESSOR_LEGACY_UNIT_FALLBACK value: {value:?}")
        })?;
    }
    if let Some(value) = lookup("ASSESSOR_PARALLELISM") {
        let parallelism: usize = value
            .trim()
            .parse()
            .with_context(|| format!("invalid ASSESSOR_PARALLELISM value: {value:?}"))?;
        anyhow::ensure!(parallelism >= 1, "ASSESSOR_PARALLELISM must be at least 1");
        config.parallelism = parallelism;
    }
    Ok(())
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}
