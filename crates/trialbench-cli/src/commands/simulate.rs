//! `trialbench simulate` — headless session with a simulated participant.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;

use trialbench_core::trial::{AdvanceEvent, ResponseEvent, TrialContext};
use trialbench_core::{
    CsvTrialLog, FormalConfig, LogConfig, MemorySink, NullPresenter, OutcomeSink, Responder,
    SessionConfig, SimulatedResponder, SubjectInfo, build_balanced_pool, run_formal_test,
    run_mastery_session, run_study_phase, synthetic_corpus,
};

/// Wraps the simulated participant so Ctrl-C aborts between trials the same
/// way escape does in a live session.
struct Interruptible {
    inner: SimulatedResponder,
    running: Arc<AtomicBool>,
}

impl Responder for Interruptible {
    fn await_response(&mut self, ctx: &TrialContext<'_>, timeout: Duration) -> ResponseEvent {
        if !self.running.load(Ordering::SeqCst) {
            return ResponseEvent::Aborted;
        }
        self.inner.await_response(ctx, timeout)
    }

    fn await_advance(&mut self) -> AdvanceEvent {
        if !self.running.load(Ordering::SeqCst) {
            return AdvanceEvent::Aborted;
        }
        self.inner.await_advance()
    }
}

/// Run the simulate command.
#[allow(clippy::too_many_arguments)]
pub fn run(
    accuracy: f64,
    timeout_rate: f64,
    items: usize,
    threshold: u32,
    blocks: usize,
    block_trials: usize,
    seed: Option<u64>,
    output: Option<&str>,
) {
    let mut rng = super::make_rng(seed);

    let corpus = synthetic_corpus(items, &mut rng);
    let pool = match build_balanced_pool(&corpus, items, &mut rng) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Cannot build a {items}-item pool: {e}");
            std::process::exit(1);
        }
    };

    let session_config = SessionConfig {
        mastery_threshold: threshold,
        ..SessionConfig::default()
    };
    let formal_config = FormalConfig {
        n_blocks: blocks,
        trials_per_block: block_trials,
        ..FormalConfig::default()
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: could not install Ctrl-C handler: {e}");
    }

    let mut responder = Interruptible {
        inner: SimulatedResponder::new(accuracy, rng.random()).with_timeout_rate(timeout_rate),
        running,
    };

    println!(
        "Simulating: {} items, threshold {}, accuracy {:.0}%, timeout rate {:.0}%",
        pool.len(),
        threshold,
        accuracy * 100.0,
        timeout_rate * 100.0
    );

    match output {
        Some(dir) => {
            let log = CsvTrialLog::new(LogConfig {
                output_dir: PathBuf::from(dir),
                subject: SubjectInfo::new("sim"),
                items: pool.ids().map(str::to_string).collect(),
                mastery_threshold: threshold,
                response_timeout: session_config.response_timeout,
                note: Some(format!("simulated, accuracy {accuracy}")),
            });
            let mut log = match log {
                Ok(log) => log,
                Err(e) => {
                    eprintln!("Failed to create session log in {dir}: {e}");
                    std::process::exit(1);
                }
            };
            let passed = phases(
                &pool,
                &session_config,
                &formal_config,
                &mut rng,
                &mut responder,
                &mut log,
            );
            match log.finish(passed) {
                Ok(dir) => println!("Session saved to {}", dir.display()),
                Err(e) => {
                    eprintln!("Failed to finalize session: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            let mut sink = MemorySink::default();
            phases(
                &pool,
                &session_config,
                &formal_config,
                &mut rng,
                &mut responder,
                &mut sink,
            );
        }
    }
}

/// The full protocol: study, mastery, formal test, printing summaries.
/// Returns the gate verdict.
fn phases<S: OutcomeSink>(
    pool: &trialbench_core::TrialPool,
    session_config: &SessionConfig,
    formal_config: &FormalConfig,
    rng: &mut rand::rngs::StdRng,
    responder: &mut Interruptible,
    sink: &mut S,
) -> Option<bool> {
    let study = run_study_phase(pool, session_config, &mut NullPresenter, responder, sink);
    let presented = match study {
        Ok(presented) => presented,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    println!(
        "Study phase: {presented} presentations ({} passes).",
        session_config.study_repetitions
    );

    let mastery = run_mastery_session(
        pool,
        session_config,
        rng,
        &mut NullPresenter,
        responder,
        sink,
    );
    let mastery = match mastery {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    println!(
        "Mastery criterion reached in {} trials (threshold {}).",
        mastery.trials, mastery.threshold
    );

    let formal = run_formal_test(
        pool,
        formal_config,
        rng,
        &mut NullPresenter,
        responder,
        sink,
    );
    let formal = match formal {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    println!();
    println!("{:>6} {:>8} {:>10}", "Block", "Correct", "Accuracy");
    for block in &formal.blocks {
        println!(
            "{:>6} {:>5}/{:<2} {:>9.1}%",
            block.index + 1,
            block.correct,
            block.total,
            block.accuracy() * 100.0
        );
    }
    println!(
        "Formal test: {}",
        if formal.passed { "PASSED" } else { "not passed" }
    );
    Some(formal.passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialbench_core::Stage;

    #[test]
    fn phases_cover_the_full_protocol() {
        let mut rng = super::super::make_rng(Some(11));
        let corpus = synthetic_corpus(4, &mut rng);
        let pool = build_balanced_pool(&corpus, 4, &mut rng).unwrap();

        let session_config = SessionConfig {
            mastery_threshold: 1,
            study_repetitions: 2,
            ..SessionConfig::default()
        };
        let formal_config = FormalConfig {
            n_blocks: 2,
            trials_per_block: 4,
            trailing_blocks: 2,
            ..FormalConfig::default()
        };

        let mut responder = Interruptible {
            inner: SimulatedResponder::new(1.0, 3).with_timeout_rate(0.0),
            running: Arc::new(AtomicBool::new(true)),
        };
        let mut sink = MemorySink::default();

        let passed = phases(
            &pool,
            &session_config,
            &formal_config,
            &mut rng,
            &mut responder,
            &mut sink,
        );
        assert_eq!(passed, Some(true));

        let count = |stage| sink.outcomes.iter().filter(|o| o.stage == stage).count();
        assert_eq!(count(Stage::Study), 8);
        assert_eq!(count(Stage::Mastery), 4);
        assert_eq!(count(Stage::Formal), 8);
    }
}
