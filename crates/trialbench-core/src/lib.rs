//! # trialbench-core
//!
//! **Adaptive mastery trial scheduling for two-choice learning experiments.**
//!
//! `trialbench-core` runs the behavioral protocol of a nonword label-learning
//! experiment: a self-paced study phase, an adaptive mastery test that keeps
//! re-drawing items until every one has been answered correctly a threshold
//! number of times, an optional error-retest pass, and a blocked formal test
//! judged by a trailing-block accuracy gate.
//!
//! ## Quick Start
//!
//! ```
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use trialbench_core::{
//!     MemorySink, NullPresenter, ScriptedEvent, ScriptedResponder, SessionConfig,
//!     TrialPool, run_mastery_session,
//! };
//! use trialbench_core::stimulus::{Label, StimulusItem};
//!
//! let pool = TrialPool::new(vec![
//!     StimulusItem::new("BRUKT", Label::Self_, "BRUKT.png"),
//!     StimulusItem::new("BANTE", Label::Other, "BANTE.png"),
//! ])
//! .unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut sink = MemorySink::default();
//! let mut responder = ScriptedResponder::always(ScriptedEvent::Correct);
//!
//! let summary = run_mastery_session(
//!     &pool,
//!     &SessionConfig::default(),
//!     &mut rng,
//!     &mut NullPresenter,
//!     &mut responder,
//!     &mut sink,
//! )
//! .unwrap();
//! // Two items, seven correct responses each.
//! assert_eq!(summary.trials, 14);
//! assert_eq!(sink.outcomes.len(), 14);
//! ```
//!
//! ## Architecture
//!
//! Pool → scheduler → trial loop → outcome sink
//!
//! The session loops own the protocol's state transitions and nothing else.
//! Presentation, input, and persistence sit behind three traits:
//! - [`Presenter`] draws fixation, stimulus, prompt, feedback, and rests.
//! - [`Responder`] performs the bounded response wait.
//! - [`OutcomeSink`] receives one append-only row per completed trial.
//!
//! The terminal frontend, the scripted test responder, and the simulated
//! participant are all just implementations of the same traits, so every
//! loop in this crate runs headless under test. All randomness flows through
//! injected [`rand::Rng`] handles; a seeded `StdRng` reproduces a session
//! exactly.

pub mod corpus;
pub mod mastery;
pub mod record;
pub mod schedule;
pub mod session;
pub mod sim;
pub mod stimulus;
pub mod trial;

pub use corpus::{Candidate, PoolError, build_balanced_pool, read_nonwords_csv, scan_dir};
pub use mastery::MasteryState;
pub use record::{CsvTrialLog, LogConfig, MemorySink, OutcomeSink, SessionMeta, SubjectInfo};
pub use schedule::{BlockReport, generate_block_trials, select_next, trailing_blocks_pass};
pub use session::{
    FormalConfig, FormalSummary, MasterySummary, NullPresenter, Presenter, Responder,
    RetestSummary, SessionConfig, SessionError, run_formal_test, run_mastery_session,
    run_retest_session, run_study_phase,
};
pub use sim::{ScriptedEvent, ScriptedResponder, SimulatedResponder, synthetic_corpus};
pub use stimulus::{Label, MidLetter, PositionMap, Side, StimulusItem, TrialPool};
pub use trial::{AdvanceEvent, ResponseEvent, Stage, TrialContext, TrialOutcome};

/// Crate version, recorded into every session's metadata file.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
