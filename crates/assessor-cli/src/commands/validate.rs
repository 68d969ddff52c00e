//! The `assessor validate` command.

use std::path::PathBuf;

use anyhow::Result;

use assessor_core::parser::{load_content, validate_content};

pub fn execute(content_path: PathBuf) -> Result<()> {
    let bundle = load_content(&content_path)?;
    anyhow::ensure!(
        !bundle.is_empty(),
        "no content found in {}",
        content_path.display()
    );

    println!(
        "Content: {} questions, {} question sets, {} question banks, {} polls, {} surveys",
        bundle.questions.len(),
        bundle.question_sets.len(),
        bundle.question_banks.len(),
        bundle.polls.len(),
        bundle.surveys.len()
    );

    let warnings = validate_content(&bundle);
    for w in &warnings {
        let prefix = w
            .item_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("All content valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
