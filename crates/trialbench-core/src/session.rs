//! Session loops: study, adaptive mastery, error retest, formal blocks.
//!
//! Every loop is the same state machine —
//! `SELECTING -> PRESENTING -> AWAITING_RESPONSE -> SCORING -> (SELECTING | COMPLETE)`
//! — driven through three collaborator seams: a [`Presenter`] that renders,
//! a [`Responder`] that owns the single bounded suspension point, and an
//! [`OutcomeSink`] that makes each scored trial durable before the next one
//! starts. Abort is checked at state boundaries and ends the session without
//! logging the in-flight trial.

use std::time::Duration;

use log::{debug, info};
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::mastery::MasteryState;
use crate::record::OutcomeSink;
use crate::schedule::{BlockReport, generate_block_trials, select_next, trailing_blocks_pass};
use crate::stimulus::{PositionMap, StimulusItem, TrialPool};
use crate::trial::{AdvanceEvent, ResponseEvent, Stage, TrialContext, TrialOutcome};

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Rendering collaborator. All methods default to no-ops so headless runs
/// (tests, simulation) need no boilerplate; a real presentation layer
/// implements whichever hooks it draws.
pub trait Presenter {
    /// Fixation point before each trial.
    fn fixation(&mut self) {}

    /// Self-paced study presentation of an item together with its label.
    fn study_item(&mut self, _item: &StimulusItem) {}

    /// Stimulus presentation for a judged trial (no label shown).
    fn stimulus(&mut self, _item: &StimulusItem) {}

    /// Two-option prompt with the trial's layout.
    fn prompt(&mut self, _positions: &PositionMap) {}

    /// Post-trial feedback (correct / wrong / too slow).
    fn feedback(&mut self, _outcome: &TrialOutcome) {}

    /// Rest period after a formal block.
    fn rest(&mut self, _report: &BlockReport, _total_blocks: usize) {}
}

/// No-op presenter for headless runs.
pub struct NullPresenter;

impl Presenter for NullPresenter {}

/// Input collaborator. Implementations block up to `timeout` for the first
/// qualifying key; keys outside the two-option set are ignored inside the
/// window and consume none of it.
pub trait Responder {
    /// Bounded wait for a two-option response.
    fn await_response(&mut self, ctx: &TrialContext<'_>, timeout: Duration) -> ResponseEvent;

    /// Unbounded wait for the self-paced advance key in the study phase.
    fn await_advance(&mut self) -> AdvanceEvent;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Parameters for the study and mastery phases.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Correct responses each item needs before the mastery loop completes.
    pub mastery_threshold: u32,
    /// Response window for judged trials.
    pub response_timeout: Duration,
    /// Full passes over the pool in the study phase.
    pub study_repetitions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mastery_threshold: 7,
            response_timeout: Duration::from_secs(2),
            study_repetitions: 5,
        }
    }
}

/// Parameters for the formal test phase.
#[derive(Debug, Clone)]
pub struct FormalConfig {
    pub n_blocks: usize,
    pub trials_per_block: usize,
    /// Accuracy each trailing block must reach.
    pub required_accuracy: f64,
    /// How many trailing blocks the gate inspects.
    pub trailing_blocks: usize,
    pub response_timeout: Duration,
}

impl Default for FormalConfig {
    fn default() -> Self {
        Self {
            n_blocks: 12,
            trials_per_block: 60,
            required_accuracy: 0.9,
            trailing_blocks: 3,
            response_timeout: Duration::from_secs(2),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors and summaries
// ---------------------------------------------------------------------------

/// Session-level failures. An incorrect or timed-out trial is not an error;
/// it simply keeps its item in the under-mastered set.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Participant pressed the abort key. The in-flight trial is not logged;
    /// previously flushed rows persist.
    #[error("session aborted by participant")]
    Aborted,

    #[error("failed to write trial log: {0}")]
    Log(#[from] std::io::Error),
}

/// Result of a completed mastery phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterySummary {
    /// Total judged trials until every item reached the threshold.
    pub trials: usize,
    pub threshold: u32,
}

/// Result of a completed error-retest phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetestSummary {
    /// Passes over the (shrinking) queue, including the final clean one.
    pub rounds: usize,
    pub trials: usize,
}

/// Result of a completed formal test phase.
#[derive(Debug, Clone, PartialEq)]
pub struct FormalSummary {
    pub blocks: Vec<BlockReport>,
    /// Verdict of the trailing-blocks accuracy gate. A failed gate still
    /// ends the session normally; nothing re-runs.
    pub passed: bool,
}

// ---------------------------------------------------------------------------
// Phase loops
// ---------------------------------------------------------------------------

/// Study phase: present every pool item with its label, self-paced, for
/// `config.study_repetitions` passes. Each presentation is logged with the
/// dwell time as its reaction time.
pub fn run_study_phase<P, I, S>(
    pool: &TrialPool,
    config: &SessionConfig,
    presenter: &mut P,
    responder: &mut I,
    sink: &mut S,
) -> Result<usize, SessionError>
where
    P: Presenter,
    I: Responder,
    S: OutcomeSink,
{
    let mut presented = 0;
    for repetition in 0..config.study_repetitions {
        for item in pool.items() {
            presenter.fixation();
            presenter.study_item(item);
            match responder.await_advance() {
                AdvanceEvent::Advanced { elapsed } => {
                    sink.append(&TrialOutcome::study(item, repetition, elapsed))?;
                    presented += 1;
                }
                AdvanceEvent::Aborted => return Err(SessionError::Aborted),
            }
        }
        debug!(
            "study pass {}/{} done",
            repetition + 1,
            config.study_repetitions
        );
    }
    info!("study phase complete: {presented} presentations");
    Ok(presented)
}

/// Adaptive mastery loop: select among under-mastered items uniformly at
/// random, test, and repeat until every item has `mastery_threshold` correct
/// responses.
///
/// There is deliberately no iteration cap: a participant who never answers
/// an item correctly keeps that item in rotation indefinitely, exactly as in
/// the source protocol.
pub fn run_mastery_session<R, P, I, S>(
    pool: &TrialPool,
    config: &SessionConfig,
    rng: &mut R,
    presenter: &mut P,
    responder: &mut I,
    sink: &mut S,
) -> Result<MasterySummary, SessionError>
where
    R: Rng + ?Sized,
    P: Presenter,
    I: Responder,
    S: OutcomeSink,
{
    let mut mastery = MasteryState::new(pool.ids(), config.mastery_threshold);
    let mut trials = 0;

    while !mastery.is_complete() {
        let item = select_next(pool, &mastery, rng);
        let outcome = run_scored_trial(
            item,
            Stage::Mastery,
            None,
            config.response_timeout,
            rng,
            presenter,
            responder,
            sink,
        )?;
        mastery.record_outcome(&outcome.item_id, outcome.correct);
        trials += 1;
        debug!(
            "mastery trial {trials}: {} {} ({}/{} to go)",
            outcome.item_id,
            if outcome.correct { "correct" } else { "incorrect" },
            mastery.remaining().len(),
            pool.len(),
        );
    }

    info!(
        "mastery criterion reached after {trials} trials (threshold {})",
        config.mastery_threshold
    );
    Ok(MasterySummary {
        trials,
        threshold: config.mastery_threshold,
    })
}

/// Error-retest loop: run the whole pool in shuffled order, collect misses,
/// re-run only the missed items, and repeat until a pass has no errors.
pub fn run_retest_session<R, P, I, S>(
    pool: &TrialPool,
    config: &SessionConfig,
    rng: &mut R,
    presenter: &mut P,
    responder: &mut I,
    sink: &mut S,
) -> Result<RetestSummary, SessionError>
where
    R: Rng + ?Sized,
    P: Presenter,
    I: Responder,
    S: OutcomeSink,
{
    let mut queue: Vec<&StimulusItem> = pool.items().iter().collect();
    queue.shuffle(rng);

    let mut rounds = 0;
    let mut trials = 0;
    loop {
        rounds += 1;
        let mut misses = Vec::new();
        for item in &queue {
            let outcome = run_scored_trial(
                item,
                Stage::Retest,
                None,
                config.response_timeout,
                rng,
                presenter,
                responder,
                sink,
            )?;
            trials += 1;
            if !outcome.correct {
                misses.push(*item);
            }
        }

        if misses.is_empty() {
            break;
        }
        debug!("retest round {rounds}: {} misses re-queued", misses.len());
        misses.shuffle(rng);
        queue = misses;
    }

    info!("retest complete after {rounds} rounds, {trials} trials");
    Ok(RetestSummary { rounds, trials })
}

/// Formal test: `n_blocks` fixed-size blocks drawn with repetition from the
/// mastered pool, a rest period (and rest log row) between blocks, and the
/// trailing-blocks accuracy gate at the end. No tracker is consulted — each
/// block runs exactly `trials_per_block` trials.
pub fn run_formal_test<R, P, I, S>(
    pool: &TrialPool,
    config: &FormalConfig,
    rng: &mut R,
    presenter: &mut P,
    responder: &mut I,
    sink: &mut S,
) -> Result<FormalSummary, SessionError>
where
    R: Rng + ?Sized,
    P: Presenter,
    I: Responder,
    S: OutcomeSink,
{
    let mut blocks = Vec::with_capacity(config.n_blocks);

    for block in 0..config.n_blocks {
        let trials = generate_block_trials(pool, config.trials_per_block, rng);
        let mut correct = 0;
        for item in trials {
            let outcome = run_scored_trial(
                item,
                Stage::Formal,
                Some(block),
                config.response_timeout,
                rng,
                presenter,
                responder,
                sink,
            )?;
            if outcome.correct {
                correct += 1;
            }
        }

        let report = BlockReport {
            index: block,
            total: config.trials_per_block,
            correct,
        };
        info!(
            "formal block {}/{}: accuracy {:.1}%",
            block + 1,
            config.n_blocks,
            report.accuracy() * 100.0
        );

        if block + 1 < config.n_blocks {
            presenter.rest(&report, config.n_blocks);
            sink.rest(block)?;
        }
        blocks.push(report);
    }

    let accuracies: Vec<f64> = blocks.iter().map(BlockReport::accuracy).collect();
    let passed = trailing_blocks_pass(
        &accuracies,
        config.trailing_blocks,
        config.required_accuracy,
    );
    info!(
        "formal test {}: trailing {} blocks vs {:.0}% required",
        if passed { "passed" } else { "failed" },
        config.trailing_blocks,
        config.required_accuracy * 100.0
    );

    Ok(FormalSummary { blocks, passed })
}

/// One judged trial: fixation, stimulus, prompt with a fresh position draw,
/// bounded response wait, scoring, feedback, durable log append.
#[allow(clippy::too_many_arguments)]
fn run_scored_trial<R, P, I, S>(
    item: &StimulusItem,
    stage: Stage,
    block: Option<usize>,
    timeout: Duration,
    rng: &mut R,
    presenter: &mut P,
    responder: &mut I,
    sink: &mut S,
) -> Result<TrialOutcome, SessionError>
where
    R: Rng + ?Sized,
    P: Presenter,
    I: Responder,
    S: OutcomeSink,
{
    let ctx = TrialContext {
        item,
        positions: PositionMap::draw(rng),
        stage,
        block,
    };

    presenter.fixation();
    presenter.stimulus(item);
    presenter.prompt(&ctx.positions);

    let event = responder.await_response(&ctx, timeout);
    if event.is_abort() {
        return Err(SessionError::Aborted);
    }

    let outcome = TrialOutcome::score(&ctx, &event);
    presenter.feedback(&outcome);
    sink.append(&outcome)?;
    Ok(outcome)
}
