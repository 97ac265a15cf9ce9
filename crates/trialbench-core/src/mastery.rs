//! Per-item mastery tracking.
//!
//! [`MasteryState`] owns the correct-response counters for one session. The
//! raw map is never exposed; callers go through `record_outcome`,
//! `is_complete` and `remaining` so the monotonicity invariant (counts never
//! decrease except through an explicit `reset`) holds by construction.

use std::collections::HashMap;

/// Correct-response counters for a fixed item set with a mastery threshold.
#[derive(Debug, Clone)]
pub struct MasteryState {
    counts: HashMap<String, u32>,
    threshold: u32,
}

impl MasteryState {
    /// Track the given item ids, all counters starting at zero.
    pub fn new<I, S>(ids: I, threshold: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let counts = ids.into_iter().map(|id| (id.into(), 0)).collect();
        Self { counts, threshold }
    }

    /// Record one scored trial. Increments the item's counter only when
    /// `correct` is true; incorrect and timed-out trials leave it unchanged.
    /// Outcomes for unknown ids are ignored.
    pub fn record_outcome(&mut self, item_id: &str, correct: bool) {
        if !correct {
            return;
        }
        if let Some(count) = self.counts.get_mut(item_id) {
            *count += 1;
        }
    }

    /// True iff every item has reached the threshold.
    pub fn is_complete(&self) -> bool {
        self.counts.values().all(|&count| count >= self.threshold)
    }

    /// Ids still below the threshold, in no particular order.
    pub fn remaining(&self) -> Vec<&str> {
        self.counts
            .iter()
            .filter(|&(_, &count)| count < self.threshold)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Current counter for an item (zero for unknown ids).
    pub fn count(&self, item_id: &str) -> u32 {
        self.counts.get(item_id).copied().unwrap_or(0)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Zero all counters. Only meant for an explicit re-learning phase; the
    /// session loop never calls this on its own.
    pub fn reset(&mut self) {
        for count in self.counts.values_mut() {
            *count = 0;
        }
    }
}
