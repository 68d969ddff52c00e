//! assessor CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "assessor",
    version,
    about = "Grade assessment submissions against TOML content"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate content TOML files
    Validate {
        /// Path to a content file or directory
        #[arg(long)]
        content: PathBuf,
    },

    /// Grade a JSON file of submissions
    Grade {
        /// Path to a content file or directory
        #[arg(long)]
        content: PathBuf,

        /// JSON array of {"user", "submission"} objects
        #[arg(long)]
        submissions: PathBuf,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,

        /// Save the full report as JSON
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show which questions of a bank a user draws, in display order
    Draw {
        /// Path to a content file or directory
        #[arg(long)]
        content: PathBuf,

        /// Question bank id
        #[arg(long)]
        bank: String,

        /// User key the seed is derived from
        #[arg(long)]
        user: String,
    },

    /// Tally poll or survey submissions
    Aggregate {
        /// Path to a content file or directory
        #[arg(long)]
        content: PathBuf,

        /// JSON array of poll or survey submissions
        #[arg(long)]
        submissions: PathBuf,

        /// Poll or survey id
        #[arg(long)]
        target: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Compare two grading reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Regression threshold
        #[arg(long, default_value = "0.05")]
        threshold: f64,

        /// Exit code 1 if regressions found
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config and example content
    Init,
}

#[tokio::main]
async fn main() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "assessor=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { content } => commands::validate::execute(content),
        Commands::Grade {
            content,
            submissions,
            format,
            output,
            config,
        } => commands::grade::execute(content, submissions, format, output, config).await,
        Commands::Draw {
            content,
            bank,
            user,
        } => commands::draw::execute(content, bank, user),
        Commands::Aggregate {
            content,
            submissions,
            target,
            format,
        } => commands::aggregate::execute(content, submissions, target, format),
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_regression, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
