//! assessor-core — Response normalization, grading, and randomization.
//!
//! This crate holds the content model, the TOML content loader, the grader
//! registry and its graders, per-user randomization, poll aggregation, and the
//! batch engine that turns submissions into reports.

pub mod aggregate;
pub mod assess;
pub mod config;
pub mod engine;
pub mod error;
pub mod graders;
pub mod math;
pub mod model;
pub mod parser;
pub mod random;
pub mod registry;
pub mod report;
pub mod repository;
pub mod response;
pub mod results;
pub mod statistics;
pub mod traits;
pub mod units;

pub use assess::{Assessor, QuestionSetSubmission, QuestionSubmission};
pub use config::GradingConfig;
pub use engine::{AssessmentEngine, Submission, SubmissionEnvelope};
pub use error::{AssessmentError, NormalizationError};
pub use model::{Part, PartKind, Question, QuestionBank, QuestionSet};
pub use registry::GraderRegistry;
pub use report::AssessmentReport;
