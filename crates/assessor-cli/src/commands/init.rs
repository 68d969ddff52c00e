//! The `assessor init` command.

use anyhow::Result;

use assessor_core::config::DEFAULT_CONFIG_FILE;

pub fn execute() -> Result<()> {
    if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
        println!("{DEFAULT_CONFIG_FILE} already exists, skipping.");
    } else {
        std::fs::write(DEFAULT_CONFIG_FILE, SAMPLE_CONFIG)?;
        println!("Created {DEFAULT_CONFIG_FILE}");
    }

    std::fs::create_dir_all("content")?;
    let example_path = std::path::Path::new("content/example.toml");
    if example_path.exists() {
        println!("content/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_CONTENT)?;
        println!("Created content/example.toml");
    }

    let submissions_path = std::path::Path::new("content/example-submissions.json");
    if submissions_path.exists() {
        println!("content/example-submissions.json already exists, skipping.");
    } else {
        std::fs::write(submissions_path, EXAMPLE_SUBMISSIONS)?;
        println!("Created content/example-submissions.json");
    }

    println!("\nNext steps:");
    println!("  1. Run: assessor validate --content content/example.toml");
    println!(
        "  2. Run: assessor grade --content content/example.toml --submissions content/example-submissions.json"
    );

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# assessor configuration

# Retry unit-less numeric answers with their first token and without a
# trailing percent sign.
legacy_unit_fallback = true

# Concurrent submissions in `assessor grade`.
parallelism = 4

[math]
max_depth = 64
max_tokens = 512
max_steps = 20000
tolerance = 1e-9
sample_points = 5
"#;

const EXAMPLE_CONTENT: &str = r#"[[questions]]
id = "q-sum"

[[questions.parts]]
kind = "numeric_math"
content = "What is 2 + 2?"
solutions = [{ value = 4 }]

[[questions]]
id = "q-planet"

[[questions.parts]]
kind = "multiple_choice"
content = "Which planet is closest to the sun?"
randomized = true
choices = ["Venus", "Mercury", "Mars"]
solutions = [{ value = "Mercury" }]

[[question_sets]]
id = "set-example"
title = "Example set"
questions = ["q-sum", "q-planet"]
"#;

const EXAMPLE_SUBMISSIONS: &str = r#"[
  {
    "user": "student-1",
    "submission": {
      "question_set_id": "set-example",
      "questions": [
        { "question_id": "q-sum", "parts": ["4"] },
        { "question_id": "q-planet", "parts": ["Mercury"] }
      ]
    }
  }
]
"#;
