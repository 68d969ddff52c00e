//! Tree comparison for math answers.

use super::expr;
use super::tree::{linearize, MathNode, MathTree};
use crate::config::MathSettings;

/// Compare a solution tree against a response tree.
///
/// A missing tree on either side is never equal, including when both are
/// missing.
pub fn math_equal(
    solution: Option<&MathTree>,
    response: Option<&MathTree>,
    settings: &MathSettings,
) -> bool {
    match (solution, response) {
        (Some(solution), Some(response)) => {
            sequences_equal(&solution.children, &response.children, settings)
        }
        _ => false,
    }
}

fn important(nodes: &[MathNode]) -> Vec<&MathNode> {
    nodes.iter().filter(|n| n.is_important()).collect()
}

fn sequences_equal(a: &[MathNode], b: &[MathNode], settings: &MathSettings) -> bool {
    let a = important(a);
    let b = important(b);

    // Whole sequences with an algebraic reading compare algebraically, so
    // `\frac{1}{2}` matches `0.5`.
    if let (Some(left), Some(right)) = (linearize(&a), linearize(&b)) {
        return text_equivalent(&left, &right, settings);
    }

    a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| node_equal(x, y, settings))
}

fn node_equal(a: &MathNode, b: &MathNode, settings: &MathSettings) -> bool {
    match (a, b) {
        (MathNode::Text(x), MathNode::Text(y)) => text_equivalent(x, y, settings),
        (
            MathNode::Element {
                name: name_a,
                args: args_a,
                children: children_a,
            },
            MathNode::Element {
                name: name_b,
                args: args_b,
                children: children_b,
            },
        ) => {
            name_a == name_b
                && args_a.len() == args_b.len()
                && args_a
                    .iter()
                    .zip(args_b)
                    .all(|(x, y)| sequences_equal(x, y, settings))
                && sequences_equal(children_a, children_b, settings)
        }
        _ => false,
    }
}

/// Text equality after normalization, falling back to algebraic equivalence.
pub fn text_equivalent(a: &str, b: &str, settings: &MathSettings) -> bool {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a == b {
        return true;
    }

    let parsed = expr::parse(&a, settings).and_then(|left| {
        let right = expr::parse(&b, settings)?;
        expr::equivalent(&left, &right, settings)
    });
    match parsed {
        Ok(equal) => equal,
        Err(e) => {
            tracing::warn!(error = %e, left = %a, right = %b, "algebraic comparison failed");
            false
        }
    }
}

/// Strip whitespace and thousands separators (`1,000` but not `1,5` or
/// `(1,2)`).
pub fn normalize_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| !(c == ',' && is_thousands_separator(&chars, i)))
        .map(|(_, &c)| c)
        .collect()
}

fn is_thousands_separator(chars: &[char], i: usize) -> bool {
    i > 0
        && chars[i - 1].is_ascii_digit()
        && chars.len() >= i + 4
        && chars[i + 1..i + 4].iter().all(char::is_ascii_digit)
        && chars.get(i + 4).map_or(true, |c| !c.is_ascii_digit())
}
