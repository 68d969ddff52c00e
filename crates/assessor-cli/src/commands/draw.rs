//! The `assessor draw` command.

use std::path::PathBuf;

use anyhow::Result;

use assessor_core::model::PartBody;
use assessor_core::parser::load_content;
use assessor_core::traits::{DigestSeedProvider, SeedProvider};

pub fn execute(content_path: PathBuf, bank_id: String, user: String) -> Result<()> {
    let bundle = load_content(&content_path)?;
    let bank = bundle
        .question_bank(&bank_id)
        .ok_or_else(|| anyhow::anyhow!("question bank '{bank_id}' not found"))?;
    let seed = DigestSeedProvider
        .seed_for(&user)
        .ok_or_else(|| anyhow::anyhow!("user key must not be empty"))?;

    let view = bank.view_for(seed);
    println!(
        "Bank {} for {user}: {} of {} question(s)",
        bank.id(),
        view.set.questions.len(),
        bank.set.questions.len()
    );

    for (pool_index, question) in view.indices.iter().zip(&view.set.questions) {
        println!("\n[{pool_index}] {}", question.id);
        for (n, part) in question.parts.iter().enumerate() {
            let shown = match &part.body {
                PartBody::MultipleChoice { choices } | PartBody::MultipleAnswer { choices } => {
                    choices.join(" | ")
                }
                PartBody::Matching { labels, values } | PartBody::Ordering { labels, values } => {
                    format!("{} => {}", labels.join(" | "), values.join(" | "))
                }
                _ => String::new(),
            };
            if shown.is_empty() {
                println!("  part {n}: {}", part.kind());
            } else {
                println!("  part {n}: {}: {shown}", part.kind());
            }
        }
    }

    Ok(())
}
