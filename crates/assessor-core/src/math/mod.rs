//! Symbolic math comparison.
//!
//! LaTeX input is parsed into a small markup tree ([`tree`]); trees are
//! compared node by node ([`compare`]), and runs of plain text fall back to an
//! algebraic parse and sampled numeric equivalence ([`expr`]). Every stage
//! runs under the budgets in [`MathSettings`](crate::config::MathSettings) and
//! degrades to "not equal" instead of failing.

pub mod compare;
pub mod expr;
pub mod tree;

use thiserror::Error;

pub use compare::{math_equal, normalize_text, text_equivalent};
pub use tree::{MathNode, MathTree};

/// Why a piece of math could not be parsed or evaluated.
///
/// Never leaves the comparator; it is logged and treated as a mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathParseError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),

    #[error("unexpected {0}")]
    UnexpectedToken(String),

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unbalanced {0:?}")]
    Unbalanced(char),

    #[error("malformed number {0:?}")]
    MalformedNumber(String),

    #[error("nesting deeper than {0}")]
    TooDeep(usize),

    #[error("more than {0} tokens")]
    TooLong(usize),

    #[error("evaluation exceeded {0} steps")]
    BudgetExceeded(usize),
}
