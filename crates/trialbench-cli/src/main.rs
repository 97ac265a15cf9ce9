//! CLI for trialbench — adaptive mastery trial scheduling at the terminal.

mod commands;
mod term;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "trialbench")]
#[command(about = "trialbench — adaptive mastery trial scheduling at the terminal")]
#[command(version = trialbench_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full session at the terminal: study, mastery test, formal test
    Run {
        /// Subject identifier (used in the session directory name)
        #[arg(long)]
        subject: String,

        /// Directory of stimulus images (one .png per nonword)
        #[arg(long)]
        stimuli: String,

        /// Pool size; must be divisible by 4 for condition balancing
        #[arg(long, default_value = "12")]
        items: usize,

        /// Correct responses per item required to pass the mastery test
        #[arg(long, default_value = "7")]
        threshold: u32,

        /// Response window in seconds
        #[arg(long, default_value = "2.0")]
        timeout: f64,

        /// Full study passes over the pool before testing
        #[arg(long, default_value = "5")]
        study_reps: usize,

        /// Number of formal test blocks
        #[arg(long, default_value = "12")]
        blocks: usize,

        /// Trials per formal block
        #[arg(long, default_value = "60")]
        block_trials: usize,

        /// Skip the study phase
        #[arg(long)]
        skip_study: bool,

        /// Skip the formal test (mastery only)
        #[arg(long)]
        skip_formal: bool,

        /// Run an error-retest pass between mastery and formal test
        #[arg(long)]
        retest: bool,

        /// Output directory for session logs (default: ./sessions/)
        #[arg(long, default_value = "sessions")]
        output: String,

        /// Seed for item assignment and trial order (default: OS entropy)
        #[arg(long)]
        seed: Option<u64>,

        /// Session note stored in session.json
        #[arg(long)]
        note: Option<String>,
    },

    /// Run a headless session with a simulated participant
    Simulate {
        /// Simulated response accuracy in [0, 1]
        #[arg(long, default_value = "0.9")]
        accuracy: f64,

        /// Fraction of trials the simulated participant lets time out
        #[arg(long, default_value = "0.02")]
        timeout_rate: f64,

        /// Pool size; must be divisible by 4
        #[arg(long, default_value = "12")]
        items: usize,

        /// Correct responses per item required to pass the mastery test
        #[arg(long, default_value = "7")]
        threshold: u32,

        /// Number of formal test blocks
        #[arg(long, default_value = "12")]
        blocks: usize,

        /// Trials per formal block
        #[arg(long, default_value = "60")]
        block_trials: usize,

        /// RNG seed for pool, schedule and participant (default: OS entropy)
        #[arg(long)]
        seed: Option<u64>,

        /// Write a full session log instead of printing a summary only
        #[arg(long)]
        output: Option<String>,
    },

    /// Inspect a stimulus directory: condition cells and pool viability
    Scan {
        /// Directory of stimulus images
        stimuli: String,

        /// Pool size to check balance against
        #[arg(long, default_value = "12")]
        items: usize,
    },

    /// List recorded sessions, or summarize one
    Sessions {
        /// Path to a specific session directory to summarize
        session: Option<String>,

        /// Directory containing session recordings (default: ./sessions/)
        #[arg(long, default_value = "sessions")]
        dir: String,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            subject,
            stimuli,
            items,
            threshold,
            timeout,
            study_reps,
            blocks,
            block_trials,
            skip_study,
            skip_formal,
            retest,
            output,
            seed,
            note,
        } => commands::run::run(commands::run::RunArgs {
            subject,
            stimuli,
            items,
            threshold,
            timeout,
            study_reps,
            blocks,
            block_trials,
            skip_study,
            skip_formal,
            retest,
            output,
            seed,
            note,
        }),
        Commands::Simulate {
            accuracy,
            timeout_rate,
            items,
            threshold,
            blocks,
            block_trials,
            seed,
            output,
        } => commands::simulate::run(
            accuracy,
            timeout_rate,
            items,
            threshold,
            blocks,
            block_trials,
            seed,
            output.as_deref(),
        ),
        Commands::Scan { stimuli, items } => commands::scan::run(&stimuli, items),
        Commands::Sessions { session, dir } => {
            commands::sessions::run(session.as_deref(), &dir)
        }
    }
}
