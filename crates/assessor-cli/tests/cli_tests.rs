//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CONTENT: &str = "../../content/sample-course.toml";
const SUBMISSIONS: &str = "../../content/submissions.json";

fn assessor() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("assessor").unwrap()
}

#[test]
fn validate_sample_content() {
    assessor()
        .args(["validate", "--content", CONTENT])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Content: 8 questions, 1 question sets, 1 question banks, 2 polls, 1 surveys",
        ))
        .stdout(predicate::str::contains("All content valid"));
}

#[test]
fn validate_directory() {
    assessor()
        .args(["validate", "--content", "../../content"])
        .assert()
        .success()
        .stdout(predicate::str::contains("8 questions"));
}

#[test]
fn validate_nonexistent_file() {
    assessor()
        .args(["validate", "--content", "nonexistent.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(
        &path,
        r#"
[[questions]]
id = "q1"

[[questions.parts]]
kind = "free_response"
solutions = [{ value = "x", weight = 1.5 }]

[[questions]]
id = "q1"
"#,
    )
    .unwrap();

    assessor()
        .args(["validate", "--content"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("WARNING"))
        .stdout(predicate::str::contains("2 warning(s) found"));
}

#[test]
fn grade_json_report() {
    let output = assessor()
        .args(["grade", "--content", CONTENT, "--submissions", SUBMISSIONS])
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let score = |user: &str| {
        report["results"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["user"] == user)
            .map(|r| r["score"].as_f64().unwrap())
            .unwrap()
    };
    assert_eq!(score("alice"), 1.0);
    assert!((score("bob") - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(score("carol"), 1.0);
    assert_eq!(score("frank"), 1.0);
    assert_eq!(score("grace"), 0.0);

    let failures = report["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["user"], "dave");

    let grace = report["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["user"] == "grace")
        .unwrap();
    let invalid = &grace["questions"][0]["parts"][1];
    assert!(invalid["assessed_value"].is_null());
    assert!(invalid["invalid"].as_str().unwrap().contains("w1"));
}

#[test]
fn grade_table_and_saved_report() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.json");

    assessor()
        .args(["grade", "--content", CONTENT, "--submissions", SUBMISSIONS])
        .arg("--output")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("set-week1"))
        .stdout(predicate::str::contains("33.3%"))
        .stdout(predicate::str::contains("FAILED"))
        .stderr(predicate::str::contains("Report saved to"));

    assert!(path.exists());
}

#[test]
fn compare_reports() {
    let dir = TempDir::new().unwrap();
    let report = dir.path().join("report.json");

    assessor()
        .args(["grade", "--content", CONTENT, "--submissions", SUBMISSIONS])
        .arg("--output")
        .arg(&report)
        .assert()
        .success();

    assessor()
        .arg("compare")
        .arg("--baseline")
        .arg(&report)
        .arg("--current")
        .arg(&report)
        .arg("--fail-on-regression")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 regressions, 0 improvements, 5 unchanged"));
}

#[test]
fn draw_shows_bank_questions() {
    assessor()
        .args(["draw", "--content", CONTENT, "--bank", "bank-practice", "--user", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bank bank-practice for alice: 2 of 4 question(s)"));
}

#[test]
fn draw_unknown_bank() {
    assessor()
        .args(["draw", "--content", CONTENT, "--bank", "nope", "--user", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("question bank 'nope' not found"));
}

#[test]
fn aggregate_survey() {
    assessor()
        .args(["aggregate", "--content", CONTENT])
        .args(["--submissions", "../../content/survey-submissions.json"])
        .args(["--target", "s-feedback", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"survey_id\": \"s-feedback\""))
        .stdout(predicate::str::contains("\"more examples please\": 2"));
}

#[test]
fn aggregate_poll_table() {
    assessor()
        .args(["aggregate", "--content", CONTENT])
        .args(["--submissions", "../../content/poll-submissions.json"])
        .args(["--target", "p-pace"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Poll p-pace: 3 submission(s)"))
        .stdout(predicate::str::contains("#1: 1, #2: 1"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    assessor()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created assessor.toml"))
        .stdout(predicate::str::contains("Created content/example.toml"));

    assert!(dir.path().join("assessor.toml").exists());
    assert!(dir.path().join("content/example.toml").exists());

    assessor()
        .current_dir(dir.path())
        .args(["validate", "--content", "content/example.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All content valid"));

    assessor()
        .current_dir(dir.path())
        .args(["grade", "--content", "content/example.toml"])
        .args(["--submissions", "content/example-submissions.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("100.0%"));
}
