//! `trialbench sessions` — list recorded sessions, or summarize one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use trialbench_core::SessionMeta;

/// Run the sessions command.
pub fn run(session_path: Option<&str>, dir: &str) {
    match session_path {
        Some(path) => {
            let session_dir = PathBuf::from(path);
            if !session_dir.join("session.json").exists() {
                eprintln!("Not a session directory: {path}");
                eprintln!("Expected session.json in that directory.");
                std::process::exit(1);
            }
            show_session(&session_dir);
        }
        None => list_sessions(dir),
    }
}

/// List all sessions in a directory, newest first.
fn list_sessions(dir: &str) {
    let sessions_dir = PathBuf::from(dir);
    if !sessions_dir.exists() {
        println!("No sessions directory found at {dir}");
        println!("Run a session first: trialbench run --subject <id> --stimuli <dir>");
        return;
    }

    let entries = match std::fs::read_dir(&sessions_dir) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Failed to read {dir}: {e}");
            return;
        }
    };

    let mut sessions: Vec<(PathBuf, SessionMeta)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Ok(contents) = std::fs::read_to_string(path.join("session.json")) else {
            continue;
        };
        let Ok(meta) = serde_json::from_str::<SessionMeta>(&contents) else {
            continue;
        };
        sessions.push((path, meta));
    }

    if sessions.is_empty() {
        println!("No sessions found in {dir}/");
        println!("Run a session first: trialbench run --subject <id> --stimuli <dir>");
        return;
    }

    sessions.sort_by(|a, b| b.1.started_at.cmp(&a.1.started_at));

    println!(
        "{:<42} {:<10} {:>6} {:>10} {:>8}",
        "Session", "Subject", "Rows", "Duration", "Formal"
    );
    println!("{}", "-".repeat(80));

    for (path, meta) in &sessions {
        let dir_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let formal = match meta.formal_passed {
            Some(true) => "pass",
            Some(false) => "fail",
            None => "-",
        };
        println!(
            "{:<42} {:<10} {:>6} {:>10} {:>8}",
            truncate(&dir_name, 42),
            truncate(&meta.subject.id, 10),
            meta.total_rows,
            format_duration_ms(meta.duration_ms),
            formal,
        );
    }

    println!("\n{} session(s) in {dir}/", sessions.len());
    println!("Run: trialbench sessions <path>  for a per-stage summary");
}

/// Per-stage summary of one session, computed from the trial rows.
fn show_session(session_dir: &Path) {
    let meta = match std::fs::read_to_string(session_dir.join("session.json")) {
        Ok(contents) => match serde_json::from_str::<SessionMeta>(&contents) {
            Ok(meta) => meta,
            Err(e) => {
                eprintln!("Malformed session.json: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Failed to read session.json: {e}");
            std::process::exit(1);
        }
    };

    println!("Session: {}", session_dir.display());
    println!("Subject: {}", meta.subject.id);
    println!(
        "Started: {}  ({})",
        meta.started_at,
        format_duration_ms(meta.duration_ms)
    );
    println!(
        "Pool:    {} items, mastery threshold {}, response window {} ms",
        meta.items.len(),
        meta.mastery_threshold,
        meta.response_timeout_ms
    );
    if let Some(note) = &meta.note {
        println!("Note:    {note}");
    }

    let csv = match std::fs::read_to_string(session_dir.join("trials.csv")) {
        Ok(csv) => csv,
        Err(e) => {
            eprintln!("Failed to read trials.csv: {e}");
            std::process::exit(1);
        }
    };

    let mut stages: BTreeMap<String, StageStats> = BTreeMap::new();
    let mut blocks: BTreeMap<usize, (usize, usize)> = BTreeMap::new();

    for line in csv.lines().skip(1) {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 13 {
            continue;
        }
        let stage = fields[1];
        if stage == "rest" || stage == "study" {
            continue;
        }

        let stats = stages.entry(stage.to_string()).or_default();
        stats.trials += 1;
        if fields[10] == "1" {
            stats.correct += 1;
        }
        if let Ok(rt) = fields[11].parse::<f64>() {
            stats.rt_sum_ms += rt;
            stats.rt_count += 1;
        }

        if stage == "formal"
            && let Ok(block) = fields[2].parse::<usize>()
        {
            let entry = blocks.entry(block).or_insert((0, 0));
            entry.0 += 1;
            if fields[10] == "1" {
                entry.1 += 1;
            }
        }
    }

    if stages.is_empty() {
        println!("\nNo judged trials recorded.");
        return;
    }

    println!();
    println!("{:<10} {:>7} {:>10} {:>12}", "Stage", "Trials", "Accuracy", "Mean RT");
    for (stage, stats) in &stages {
        println!(
            "{:<10} {:>7} {:>9.1}% {:>9.0} ms",
            stage,
            stats.trials,
            stats.accuracy() * 100.0,
            stats.mean_rt_ms()
        );
    }

    if !blocks.is_empty() {
        println!();
        println!("Formal blocks:");
        for (block, (total, correct)) in &blocks {
            let accuracy = *correct as f64 / *total as f64;
            println!(
                "  block {:>2}: {:>3}/{:<3} ({:.1}%)",
                block + 1,
                correct,
                total,
                accuracy * 100.0
            );
        }
        match meta.formal_passed {
            Some(true) => println!("Gate verdict: PASSED"),
            Some(false) => println!("Gate verdict: not passed"),
            None => {}
        }
    }
}

#[derive(Default)]
struct StageStats {
    trials: usize,
    correct: usize,
    rt_sum_ms: f64,
    rt_count: usize,
}

impl StageStats {
    fn accuracy(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.correct as f64 / self.trials as f64
        }
    }

    fn mean_rt_ms(&self) -> f64 {
        if self.rt_count == 0 {
            0.0
        } else {
            self.rt_sum_ms / self.rt_count as f64
        }
    }
}

fn format_duration_ms(ms: u64) -> String {
    let secs = ms / 1000;
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let keep: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{keep}…")
    }
}
