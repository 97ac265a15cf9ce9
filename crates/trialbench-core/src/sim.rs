//! Scripted and simulated responders.
//!
//! Both implement [`Responder`] so the same session loops run headless:
//! [`ScriptedResponder`] replays an exact event sequence (tests assert
//! schedules deterministically), [`SimulatedResponder`] models a participant
//! with a target accuracy (pipeline checks, log generation).

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::corpus::Candidate;
use crate::session::Responder;
use crate::stimulus::MidLetter;
use crate::trial::{AdvanceEvent, ResponseEvent, TrialContext};

// ---------------------------------------------------------------------------
// Scripted responder
// ---------------------------------------------------------------------------

/// One scripted response, resolved against the trial's position map when the
/// trial runs: `Correct` presses whichever side holds the item's label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedEvent {
    Correct,
    Incorrect,
    Timeout,
    Abort,
}

/// Replays a fixed event sequence. Panics when the script runs out — a test
/// that schedules more trials than it scripted is a broken test.
#[derive(Debug)]
pub struct ScriptedResponder {
    events: VecDeque<ScriptedEvent>,
    repeat: Option<ScriptedEvent>,
}

impl ScriptedResponder {
    pub fn new(events: Vec<ScriptedEvent>) -> Self {
        Self {
            events: events.into(),
            repeat: None,
        }
    }

    /// Respond with the same event forever.
    pub fn always(event: ScriptedEvent) -> Self {
        Self {
            events: VecDeque::new(),
            repeat: Some(event),
        }
    }

    fn next_event(&mut self) -> ScriptedEvent {
        self.events
            .pop_front()
            .or(self.repeat)
            .expect("scripted responder ran out of events")
    }
}

impl Responder for ScriptedResponder {
    fn await_response(&mut self, ctx: &TrialContext<'_>, _timeout: Duration) -> ResponseEvent {
        let expected = ctx.expected_side();
        match self.next_event() {
            ScriptedEvent::Correct => ResponseEvent::Responded {
                side: expected,
                elapsed: Duration::from_millis(500),
            },
            ScriptedEvent::Incorrect => ResponseEvent::Responded {
                side: expected.opposite(),
                elapsed: Duration::from_millis(500),
            },
            ScriptedEvent::Timeout => ResponseEvent::TimedOut,
            ScriptedEvent::Abort => ResponseEvent::Aborted,
        }
    }

    fn await_advance(&mut self) -> AdvanceEvent {
        // Study presentations advance immediately; a leading Abort in the
        // script aborts here too.
        if self.events.front() == Some(&ScriptedEvent::Abort) {
            self.events.pop_front();
            return AdvanceEvent::Aborted;
        }
        AdvanceEvent::Advanced {
            elapsed: Duration::from_millis(1500),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulated responder
// ---------------------------------------------------------------------------

/// Models a participant with a target accuracy, an occasional timeout, and
/// uniformly drawn reaction times. Fully deterministic given a seed.
#[derive(Debug)]
pub struct SimulatedResponder {
    accuracy: f64,
    timeout_rate: f64,
    rng: StdRng,
}

impl SimulatedResponder {
    pub fn new(accuracy: f64, seed: u64) -> Self {
        Self {
            accuracy: accuracy.clamp(0.0, 1.0),
            timeout_rate: 0.02,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_timeout_rate(mut self, rate: f64) -> Self {
        self.timeout_rate = rate.clamp(0.0, 1.0);
        self
    }
}

impl Responder for SimulatedResponder {
    fn await_response(&mut self, ctx: &TrialContext<'_>, _timeout: Duration) -> ResponseEvent {
        if self.rng.random_bool(self.timeout_rate) {
            return ResponseEvent::TimedOut;
        }
        let expected = ctx.expected_side();
        let side = if self.rng.random_bool(self.accuracy) {
            expected
        } else {
            expected.opposite()
        };
        ResponseEvent::Responded {
            side,
            elapsed: Duration::from_millis(self.rng.random_range(300..1200)),
        }
    }

    fn await_advance(&mut self) -> AdvanceEvent {
        AdvanceEvent::Advanced {
            elapsed: Duration::from_millis(self.rng.random_range(800..2500)),
        }
    }
}

// ---------------------------------------------------------------------------
// Synthetic corpus
// ---------------------------------------------------------------------------

const CONSONANTS: &[u8] = b"BCDFGHJKLMPRSTVWZ";

/// Generate a synthetic nonword corpus with `n_per_mid` candidates per mid
/// letter, for runs that need no stimulus files on disk.
pub fn synthetic_corpus<R: Rng + ?Sized>(n_per_mid: usize, rng: &mut R) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(n_per_mid * 2);

    for mid in [MidLetter::U, MidLetter::N] {
        let mid_char = match mid {
            MidLetter::U => 'U',
            MidLetter::N => 'N',
        };
        let mut produced = 0;
        while produced < n_per_mid {
            let mut token = String::with_capacity(5);
            for position in 0..5 {
                if position == 2 {
                    token.push(mid_char);
                } else {
                    let idx = rng.random_range(0..CONSONANTS.len());
                    token.push(CONSONANTS[idx] as char);
                }
            }
            if seen.insert(token.clone()) {
                candidates.push(Candidate {
                    asset: PathBuf::from(format!("{token}.png")),
                    mid,
                    id: token,
                });
                produced += 1;
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::{Label, PositionMap, StimulusItem};
    use crate::trial::Stage;

    fn ctx(item: &StimulusItem) -> TrialContext<'_> {
        TrialContext {
            item,
            positions: PositionMap::new(Label::Self_),
            stage: Stage::Mastery,
            block: None,
        }
    }

    #[test]
    fn scripted_correct_presses_expected_side() {
        let item = StimulusItem::new("BRUKT", Label::Self_, "BRUKT.png");
        let mut responder = ScriptedResponder::new(vec![
            ScriptedEvent::Correct,
            ScriptedEvent::Incorrect,
            ScriptedEvent::Timeout,
        ]);

        let ctx = ctx(&item);
        let expected = ctx.expected_side();
        match responder.await_response(&ctx, Duration::from_secs(2)) {
            ResponseEvent::Responded { side, .. } => assert_eq!(side, expected),
            other => panic!("unexpected event {other:?}"),
        }
        match responder.await_response(&ctx, Duration::from_secs(2)) {
            ResponseEvent::Responded { side, .. } => assert_eq!(side, expected.opposite()),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(
            responder.await_response(&ctx, Duration::from_secs(2)),
            ResponseEvent::TimedOut
        );
    }

    #[test]
    #[should_panic(expected = "ran out of events")]
    fn scripted_panics_when_exhausted() {
        let item = StimulusItem::new("BRUKT", Label::Self_, "BRUKT.png");
        let mut responder = ScriptedResponder::new(vec![]);
        responder.await_response(&ctx(&item), Duration::from_secs(2));
    }

    #[test]
    fn simulated_is_deterministic_per_seed() {
        let item = StimulusItem::new("BRUKT", Label::Self_, "BRUKT.png");
        let mut a = SimulatedResponder::new(0.8, 99);
        let mut b = SimulatedResponder::new(0.8, 99);
        for _ in 0..20 {
            assert_eq!(
                a.await_response(&ctx(&item), Duration::from_secs(2)),
                b.await_response(&ctx(&item), Duration::from_secs(2))
            );
        }
    }

    #[test]
    fn simulated_accuracy_tracks_target() {
        let item = StimulusItem::new("BRUKT", Label::Self_, "BRUKT.png");
        let mut responder = SimulatedResponder::new(0.9, 7).with_timeout_rate(0.0);
        let ctx = ctx(&item);
        let expected = ctx.expected_side();

        let mut correct = 0;
        for _ in 0..500 {
            if let ResponseEvent::Responded { side, .. } =
                responder.await_response(&ctx, Duration::from_secs(2))
                && side == expected
            {
                correct += 1;
            }
        }
        assert!((400..=490).contains(&correct), "correct = {correct}/500");
    }

    #[test]
    fn synthetic_corpus_is_balanced_and_unique() {
        let mut rng = StdRng::seed_from_u64(13);
        let corpus = synthetic_corpus(6, &mut rng);
        assert_eq!(corpus.len(), 12);

        let unique: HashSet<&str> = corpus.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(unique.len(), 12);

        for mid in [MidLetter::U, MidLetter::N] {
            assert_eq!(corpus.iter().filter(|c| c.mid == mid).count(), 6);
        }
        for candidate in &corpus {
            assert_eq!(MidLetter::of(&candidate.id), Some(candidate.mid));
        }
    }
}
