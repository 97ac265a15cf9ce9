//! Trial outcomes and response events.
//!
//! The response wait is a single suspension point with a bounded timeout and
//! a closed result type — the session loop's transition table is the only
//! place timing behavior is decided, never an ad hoc polling loop.

use std::str::FromStr;
use std::time::{Duration, SystemTime};

use crate::stimulus::{Label, PositionMap, Side, StimulusItem};

/// Protocol stage a trial belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Self-paced presentation of item + label, no judgment.
    Study,
    /// Adaptive per-item mastery test.
    Mastery,
    /// Whole-pool pass with error re-queueing.
    Retest,
    /// Fixed-size blocks under the accuracy gate.
    Formal,
    /// Non-trial rest period between formal blocks.
    Rest,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Study => write!(f, "study"),
            Self::Mastery => write!(f, "mastery"),
            Self::Retest => write!(f, "retest"),
            Self::Formal => write!(f, "formal"),
            Self::Rest => write!(f, "rest"),
        }
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "study" => Ok(Self::Study),
            "mastery" => Ok(Self::Mastery),
            "retest" => Ok(Self::Retest),
            "formal" => Ok(Self::Formal),
            "rest" => Ok(Self::Rest),
            other => Err(format!("unknown stage `{other}`")),
        }
    }
}

/// Result of the bounded response wait for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseEvent {
    /// First qualifying key inside the window; later keys are ignored.
    Responded { side: Side, elapsed: Duration },
    /// Window elapsed with no qualifying key. Always scored incorrect.
    TimedOut,
    /// Explicit abort input (escape). Ends the session without scoring or
    /// logging the in-flight trial.
    Aborted,
}

impl ResponseEvent {
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Result of the self-paced advance wait in the study phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceEvent {
    Advanced { elapsed: Duration },
    Aborted,
}

/// Everything a responder may inspect about the trial it is answering.
#[derive(Debug, Clone, Copy)]
pub struct TrialContext<'a> {
    pub item: &'a StimulusItem,
    pub positions: PositionMap,
    pub stage: Stage,
    pub block: Option<usize>,
}

impl TrialContext<'_> {
    /// The side a correct response must press for this trial.
    pub fn expected_side(&self) -> Side {
        self.positions.side_of(self.item.label)
    }
}

/// One scored (or study) trial, append-only once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub item_id: String,
    pub condition: Label,
    pub stage: Stage,
    pub block: Option<usize>,
    /// Prompt layout; `None` for study presentations (no prompt shown).
    pub positions: Option<PositionMap>,
    pub expected: Option<Side>,
    /// `None` on timeout.
    pub response: Option<Side>,
    pub correct: bool,
    /// `None` on timeout.
    pub reaction_time: Option<Duration>,
    pub timestamp: SystemTime,
}

impl TrialOutcome {
    /// Score a two-option trial from its response event.
    ///
    /// A timeout is incorrect by definition. `Aborted` must be handled by
    /// the session loop before scoring; it is treated as a timeout here only
    /// to keep the function total.
    pub fn score(ctx: &TrialContext<'_>, event: &ResponseEvent) -> Self {
        debug_assert!(!event.is_abort(), "abort events are not scorable");

        let expected = ctx.expected_side();
        let (response, reaction_time) = match event {
            ResponseEvent::Responded { side, elapsed } => (Some(*side), Some(*elapsed)),
            ResponseEvent::TimedOut | ResponseEvent::Aborted => (None, None),
        };

        Self {
            item_id: ctx.item.id.clone(),
            condition: ctx.item.label,
            stage: ctx.stage,
            block: ctx.block,
            positions: Some(ctx.positions),
            expected: Some(expected),
            response,
            correct: response == Some(expected),
            reaction_time,
            timestamp: SystemTime::now(),
        }
    }

    /// Record one self-paced study presentation.
    pub fn study(item: &StimulusItem, repetition: usize, elapsed: Duration) -> Self {
        Self {
            item_id: item.id.clone(),
            condition: item.label,
            stage: Stage::Study,
            block: Some(repetition),
            positions: None,
            expected: None,
            response: None,
            correct: true,
            reaction_time: Some(elapsed),
            timestamp: SystemTime::now(),
        }
    }
}
