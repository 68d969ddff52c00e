//! The `assessor aggregate` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use assessor_core::aggregate::{
    aggregate_poll, aggregate_survey, AggregatedPoll, PollSubmission, SurveySubmission, Tally,
};
use assessor_core::parser::load_content;

use super::read_json;

pub fn execute(
    content_path: PathBuf,
    submissions_path: PathBuf,
    target: String,
    format: String,
) -> Result<()> {
    let bundle = load_content(&content_path)?;

    let polls = if let Some(poll) = bundle.poll(&target) {
        let submissions: Vec<PollSubmission> = read_json(&submissions_path)?;
        vec![aggregate_poll(poll, &submissions)?]
    } else if let Some(survey) = bundle.survey(&target) {
        let submissions: Vec<SurveySubmission> = read_json(&submissions_path)?;
        let aggregated = aggregate_survey(survey, &submissions)?;
        if format == "json" {
            println!("{}", serde_json::to_string_pretty(&aggregated)?);
            return Ok(());
        }
        println!("Survey {}: {} submission(s)", aggregated.survey_id, aggregated.submissions);
        aggregated.polls
    } else {
        anyhow::bail!("no poll or survey with id '{target}'");
    };

    for poll in &polls {
        if format == "json" {
            println!("{}", serde_json::to_string_pretty(poll)?);
        } else {
            print_poll(poll);
        }
    }

    Ok(())
}

fn print_poll(poll: &AggregatedPoll) {
    println!("\nPoll {}: {} submission(s)", poll.poll_id, poll.submissions);

    let mut table = Table::new();
    table.set_header(vec!["Part", "Kind", "Responses", "Invalid", "Tally"]);
    for (n, part) in poll.parts.iter().enumerate() {
        table.add_row(vec![
            Cell::new(n),
            Cell::new(part.kind),
            Cell::new(part.responses),
            Cell::new(part.invalid),
            Cell::new(describe(&part.tally)),
        ]);
    }
    println!("{table}");
}

fn describe(tally: &Tally) -> String {
    match tally {
        Tally::Choices { counts } => counts
            .iter()
            .map(|(choice, n)| format!("#{choice}: {n}"))
            .collect::<Vec<_>>()
            .join(", "),
        Tally::Pairs { counts } => counts
            .iter()
            .map(|p| format!("{}->{}: {}", p.label, p.value, p.count))
            .collect::<Vec<_>>()
            .join(", "),
        Tally::Text { counts } => counts
            .iter()
            .map(|(text, n)| format!("{text:?}: {n}"))
            .collect::<Vec<_>>()
            .join(", "),
        Tally::Blanks { counts } => counts
            .iter()
            .map(|(blank, values)| {
                let inner = values
                    .iter()
                    .map(|(v, n)| format!("{v:?}: {n}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{blank} [{inner}]")
            })
            .collect::<Vec<_>>()
            .join("; "),
        Tally::Bodies { bodies } => format!("{} bodies", bodies.len()),
        Tally::Files { files } => format!("{} files", files.len()),
    }
}
