//! `trialbench run` — a full live session at the terminal.

use std::path::PathBuf;
use std::time::Duration;

use trialbench_core::{
    CsvTrialLog, FormalConfig, LogConfig, SessionConfig, SessionError, SubjectInfo,
    run_formal_test, run_mastery_session, run_retest_session, run_study_phase,
};

use crate::term::{RawModeGuard, TermPresenter, TermResponder};

pub struct RunArgs {
    pub subject: String,
    pub stimuli: String,
    pub items: usize,
    pub threshold: u32,
    pub timeout: f64,
    pub study_reps: usize,
    pub blocks: usize,
    pub block_trials: usize,
    pub skip_study: bool,
    pub skip_formal: bool,
    pub retest: bool,
    pub output: String,
    pub seed: Option<u64>,
    pub note: Option<String>,
}

/// Run the run command.
#[allow(clippy::too_many_lines)]
pub fn run(args: RunArgs) {
    let mut rng = super::make_rng(args.seed);
    let pool = super::make_pool(&args.stimuli, args.items, &mut rng);

    let session_config = SessionConfig {
        mastery_threshold: args.threshold,
        response_timeout: Duration::from_secs_f64(args.timeout),
        study_repetitions: args.study_reps,
    };
    let formal_config = FormalConfig {
        n_blocks: args.blocks,
        trials_per_block: args.block_trials,
        response_timeout: Duration::from_secs_f64(args.timeout),
        ..FormalConfig::default()
    };

    let mut log = match CsvTrialLog::new(LogConfig {
        output_dir: PathBuf::from(&args.output),
        subject: SubjectInfo::new(&args.subject),
        items: pool.ids().map(str::to_string).collect(),
        mastery_threshold: args.threshold,
        response_timeout: session_config.response_timeout,
        note: args.note.clone(),
    }) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("Failed to create session log in {}: {e}", args.output);
            std::process::exit(1);
        }
    };

    println!("Session for subject {} — {} items", args.subject, pool.len());
    println!("Logging to {}", log.session_dir().display());
    println!();

    let guard = match RawModeGuard::new() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to enter raw terminal mode: {e}");
            std::process::exit(1);
        }
    };
    let mut presenter = TermPresenter;
    let mut responder = TermResponder;

    if !args.skip_study {
        let result = run_study_phase(
            &pool,
            &session_config,
            &mut presenter,
            &mut responder,
            &mut log,
        );
        if let Err(e) = result {
            bail(guard, e);
        }
    }

    let mastery = run_mastery_session(
        &pool,
        &session_config,
        &mut rng,
        &mut presenter,
        &mut responder,
        &mut log,
    );
    let mastery = match mastery {
        Ok(summary) => summary,
        Err(e) => bail(guard, e),
    };

    if args.retest {
        let result = run_retest_session(
            &pool,
            &session_config,
            &mut rng,
            &mut presenter,
            &mut responder,
            &mut log,
        );
        if let Err(e) = result {
            bail(guard, e);
        }
    }

    let formal_passed = if args.skip_formal {
        None
    } else {
        let formal = run_formal_test(
            &pool,
            &formal_config,
            &mut rng,
            &mut presenter,
            &mut responder,
            &mut log,
        );
        match formal {
            Ok(summary) => Some(summary.passed),
            Err(e) => bail(guard, e),
        }
    };

    drop(guard);

    let dir = match log.finish(formal_passed) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Failed to finalize session: {e}");
            std::process::exit(1);
        }
    };

    println!();
    println!(
        "Mastery criterion reached in {} trials (threshold {}).",
        mastery.trials, mastery.threshold
    );
    match formal_passed {
        Some(true) => println!("Formal test: PASSED"),
        Some(false) => println!("Formal test: not passed"),
        None => {}
    }
    println!("Session saved to {}", dir.display());
}

/// Abort path: restore the terminal, report, and exit. Flushed CSV rows
/// survive; no session.json is written.
fn bail(guard: RawModeGuard, e: SessionError) -> ! {
    drop(guard);
    eprintln!();
    eprintln!("{e}");
    eprintln!("Partial trial log kept; session.json not written.");
    std::process::exit(1);
}
