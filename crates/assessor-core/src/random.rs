//! Per-user deterministic randomization.
//!
//! A user's seed always yields the same permutation for the same ordering
//! operation, so a randomized part displays and grades consistently across
//! requests. Grading maps shuffled-space indices back to the canonical
//! indices solutions are written in.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use sha2::{Digest, Sha256};

use crate::model::{
    IndexRange, Part, PartBody, Question, QuestionBank, QuestionSet, SolutionValue,
};

/// Derive a stable seed from an opaque user key.
pub fn seed_from_key(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Build the generator for `seed`.
///
/// High-entropy generators are seeded with the full SHA-256 digest of the
/// seed instead of the seed itself.
pub fn generator(seed: u64, high_entropy: bool) -> StdRng {
    if high_entropy {
        let digest = Sha256::digest(seed.to_be_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        StdRng::from_seed(bytes)
    } else {
        StdRng::seed_from_u64(seed)
    }
}

/// Shuffle `items` in place and hand them back for chaining.
pub fn shuffle<'a, T>(rng: &mut StdRng, items: &'a mut Vec<T>) -> &'a mut Vec<T> {
    items.shuffle(rng);
    items
}

/// A seeded permutation of `0..len` and its inverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    /// `order[shuffled] == original`
    order: Vec<usize>,
    /// `inverse[original] == shuffled`
    inverse: Vec<usize>,
}

impl Permutation {
    /// The permutation a fresh generator for `seed` applies to `len` items.
    pub fn new(seed: u64, high_entropy: bool, len: usize) -> Self {
        let mut rng = generator(seed, high_entropy);
        let mut order: Vec<usize> = (0..len).collect();
        shuffle(&mut rng, &mut order);
        Self::from_order(order)
    }

    fn from_order(order: Vec<usize>) -> Self {
        let mut inverse = vec![0; order.len()];
        for (shuffled, &original) in order.iter().enumerate() {
            inverse[original] = shuffled;
        }
        Self { order, inverse }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Canonical index of the item displayed at `shuffled`.
    pub fn to_original(&self, shuffled: usize) -> Option<usize> {
        self.order.get(shuffled).copied()
    }

    /// Display position of the canonical item `original`.
    pub fn to_shuffled(&self, original: usize) -> Option<usize> {
        self.inverse.get(original).copied()
    }

    /// Reorder `items` into display order. `items.len()` must equal `len()`.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        self.order.iter().map(|&i| items[i].clone()).collect()
    }
}

/// Map shuffled-space indices to sorted canonical indices.
pub fn unshuffle_indices(perm: &Permutation, indices: &[usize]) -> Option<Vec<usize>> {
    let mut original = indices
        .iter()
        .map(|&i| perm.to_original(i))
        .collect::<Option<Vec<_>>>()?;
    original.sort_unstable();
    original.dedup();
    Some(original)
}

/// Map the value side of label→value connections back to canonical indices.
pub fn unshuffle_connections(
    values: &Permutation,
    connections: &BTreeMap<usize, usize>,
) -> Option<BTreeMap<usize, usize>> {
    connections
        .iter()
        .map(|(&label, &value)| values.to_original(value).map(|v| (label, v)))
        .collect()
}

/// The permutation a randomized part applies to its choices or values.
///
/// `None` when the part is not randomized or has nothing to permute.
pub fn part_permutation(part: &Part, seed: u64) -> Option<Permutation> {
    if !part.randomized {
        return None;
    }
    let len = match &part.body {
        PartBody::MultipleChoice { choices } | PartBody::MultipleAnswer { choices } => {
            choices.len()
        }
        PartBody::Matching { values, .. } | PartBody::Ordering { values, .. } => values.len(),
        _ => return None,
    };
    Some(Permutation::new(seed, part.high_entropy, len))
}

/// Pick which questions of a pool of `pool_len` a user sees.
///
/// Without `draw` (or with `draw >= pool_len`) the whole pool is returned in
/// order. With ranges, each range is sampled with its own draw count by a
/// generator re-seeded identically per range, so one range's outcome does not
/// depend on another's. The result is sorted ascending.
pub fn questionbank_question_chooser(
    pool_len: usize,
    draw: Option<usize>,
    ranges: &[IndexRange],
    seed: u64,
    high_entropy: bool,
) -> Vec<usize> {
    let draw = match draw {
        Some(d) if d < pool_len => d,
        _ => return (0..pool_len).collect(),
    };

    let mut chosen = if ranges.is_empty() {
        let mut rng = generator(seed, high_entropy);
        index::sample(&mut rng, pool_len, draw).into_vec()
    } else {
        let mut chosen = Vec::new();
        for range in ranges {
            let end = range.end.min(pool_len);
            let len = end.saturating_sub(range.start);
            let amount = range.draw.min(len);
            let mut rng = generator(seed, high_entropy);
            chosen.extend(
                index::sample(&mut rng, len, amount)
                    .into_iter()
                    .map(|i| range.start + i),
            );
        }
        chosen
    };
    chosen.sort_unstable();
    chosen
}

/// A question as one user sees it: randomized parts reordered.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomizedQuestionView {
    pub seed: u64,
    /// Display-order copy of the question. Solutions are remapped into
    /// display space so the copy is self-consistent; grading always runs
    /// against the canonical question.
    pub question: Question,
}

/// Reorder the randomized parts of `question` for the user with `seed`.
pub fn randomize_view(question: &Question, seed: u64) -> RandomizedQuestionView {
    let parts = question
        .parts
        .iter()
        .map(|part| randomize_part(part, seed).unwrap_or_else(|| part.clone()))
        .collect();
    RandomizedQuestionView {
        seed,
        question: Question {
            id: question.id.clone(),
            content: question.content.clone(),
            parts,
        },
    }
}

/// A randomized part in the order the user with `seed` sees it. `None` when
/// the part is not randomized.
pub fn randomize_part(part: &Part, seed: u64) -> Option<Part> {
    part_permutation(part, seed).map(|perm| permute_part(part, &perm))
}

fn permute_part(part: &Part, perm: &Permutation) -> Part {
    let mut out = part.clone();
    match &mut out.body {
        PartBody::MultipleChoice { choices } | PartBody::MultipleAnswer { choices } => {
            *choices = perm.apply(choices);
        }
        PartBody::Matching { values, .. } | PartBody::Ordering { values, .. } => {
            *values = perm.apply(values);
        }
        _ => {}
    }
    for solution in &mut out.solutions {
        match &mut solution.value {
            SolutionValue::MultipleChoice(index) => {
                if let Some(shuffled) = perm.to_shuffled(*index) {
                    *index = shuffled;
                }
            }
            SolutionValue::MultipleAnswer(indices) => {
                let mut shuffled: Vec<usize> =
                    indices.iter().filter_map(|&i| perm.to_shuffled(i)).collect();
                shuffled.sort_unstable();
                *indices = shuffled;
            }
            SolutionValue::Connecting(map) => {
                *map = map
                    .iter()
                    .filter_map(|(&label, &value)| perm.to_shuffled(value).map(|v| (label, v)))
                    .collect();
            }
            _ => {}
        }
    }
    out
}

/// The questions of a bank one user is shown.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionBankView {
    pub seed: u64,
    /// Pool indices of the drawn questions, ascending.
    pub indices: Vec<usize>,
    pub set: QuestionSet,
}

impl QuestionBank {
    /// Pool indices drawn for `seed`.
    pub fn draw_for(&self, seed: u64) -> Vec<usize> {
        questionbank_question_chooser(
            self.set.questions.len(),
            self.draw,
            &self.ranges,
            seed,
            self.high_entropy,
        )
    }

    /// The drawn questions for `seed`, each in its randomized display order.
    pub fn view_for(&self, seed: u64) -> QuestionBankView {
        let indices = self.draw_for(seed);
        let questions = indices
            .iter()
            .map(|&i| randomize_view(&self.set.questions[i], seed).question)
            .collect();
        QuestionBankView {
            seed,
            indices,
            set: QuestionSet {
                id: self.set.id.clone(),
                title: self.set.title.clone(),
                questions,
            },
        }
    }
}
