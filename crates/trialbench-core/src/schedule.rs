//! Trial selection and block scheduling.
//!
//! All randomness flows through injected [`rand::Rng`] handles so tests can
//! drive every schedule with a seeded generator and assert exact orders.

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::mastery::MasteryState;
use crate::stimulus::{StimulusItem, TrialPool};

/// Pick the next item to test: uniform random over the not-yet-mastered
/// subset.
///
/// Uniform re-selection (rather than round-robin) keeps persistently missed
/// items from being predictably delayed and stops the participant from
/// learning a fixed sequence. When one item remains it is always chosen.
///
/// # Panics
///
/// Calling this with a completed tracker is a programming error; the session
/// loop gates on [`MasteryState::is_complete`] before selecting.
pub fn select_next<'a, R: Rng + ?Sized>(
    pool: &'a TrialPool,
    mastery: &MasteryState,
    rng: &mut R,
) -> &'a StimulusItem {
    let remaining: Vec<&StimulusItem> = pool
        .items()
        .iter()
        .filter(|item| mastery.count(&item.id) < mastery.threshold())
        .collect();

    remaining
        .choose(rng)
        .copied()
        .expect("select_next called with a completed mastery tracker")
}

/// Generate one formal-test block of exactly `n_trials` trials.
///
/// Every pool item repeats `n_trials / pool.len()` times; the remainder is
/// filled with distinct items drawn at random; the whole block is shuffled.
pub fn generate_block_trials<'a, R: Rng + ?Sized>(
    pool: &'a TrialPool,
    n_trials: usize,
    rng: &mut R,
) -> Vec<&'a StimulusItem> {
    let items = pool.items();
    let base_repeats = n_trials / items.len();
    let remainder = n_trials % items.len();

    let mut trials = Vec::with_capacity(n_trials);
    for _ in 0..base_repeats {
        trials.extend(items.iter());
    }
    for index in rand::seq::index::sample(rng, items.len(), remainder) {
        trials.push(&items[index]);
    }

    trials.shuffle(rng);
    trials
}

/// Accuracy record for one formal-test block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReport {
    /// Zero-based block index.
    pub index: usize,
    pub total: usize,
    pub correct: usize,
}

impl BlockReport {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Block-accuracy gate: true iff at least `trailing` blocks exist and each
/// of the trailing `trailing` accuracies meets `required`.
pub fn trailing_blocks_pass(accuracies: &[f64], trailing: usize, required: f64) -> bool {
    if accuracies.len() < trailing {
        return false;
    }
    accuracies[accuracies.len() - trailing..]
        .iter()
        .all(|&accuracy| accuracy >= required)
}
