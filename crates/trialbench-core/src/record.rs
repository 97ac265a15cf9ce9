//! Trial log recording.
//!
//! The session loop emits [`TrialOutcome`]s into an [`OutcomeSink`]; the
//! scheduler itself never touches the filesystem. [`CsvTrialLog`] is the
//! durable sink: an append-only CSV flushed after every row (a crash loses
//! at most the in-flight trial) plus a `session.json` metadata file written
//! on graceful finish.
//!
//! # Storage format
//!
//! Each session is a directory `{timestamp}-sub-{subject}` containing:
//! - `trials.csv` — one row per trial and per rest period
//! - `session.json` — subject, pool, config and totals

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trial::{Stage, TrialOutcome};

/// CSV header for `trials.csv`.
pub const CSV_HEADER: &str = "subject_id,stage,block,trial_index,condition,nonword,\
left_label,right_label,subject_response,true_response,correct,rt_ms,timestamp";

/// Sentinel for absent values (no response, no RT, rest rows).
pub const NA: &str = "NA";

// ---------------------------------------------------------------------------
// Sink trait and in-memory sink
// ---------------------------------------------------------------------------

/// Receiver for the ordered trial log. Implementations must make each row
/// durable before returning — the session loop will not start the next trial
/// until the append completes.
pub trait OutcomeSink {
    fn append(&mut self, outcome: &TrialOutcome) -> io::Result<()>;

    /// Record a non-trial rest period after formal block `block`.
    fn rest(&mut self, block: usize) -> io::Result<()>;
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub outcomes: Vec<TrialOutcome>,
    pub rests: Vec<usize>,
}

impl OutcomeSink for MemorySink {
    fn append(&mut self, outcome: &TrialOutcome) -> io::Result<()> {
        self.outcomes.push(outcome.clone());
        Ok(())
    }

    fn rest(&mut self, block: usize) -> io::Result<()> {
        self.rests.push(block);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Subject info and session metadata
// ---------------------------------------------------------------------------

/// Participant identity captured at session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub id: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
}

impl SubjectInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            age: None,
            gender: None,
        }
    }
}

/// Session metadata written to session.json on graceful finish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub version: u32,
    pub id: String,
    pub subject: SubjectInfo,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    /// Pool item ids in session order.
    pub items: Vec<String>,
    pub mastery_threshold: u32,
    pub response_timeout_ms: u64,
    pub total_rows: u64,
    pub rows_per_stage: HashMap<String, u64>,
    /// Verdict of the formal-test accuracy gate, when that phase ran.
    pub formal_passed: Option<bool>,
    pub note: Option<String>,
    pub trialbench_version: String,
}

/// Configuration for a durable trial log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub output_dir: PathBuf,
    pub subject: SubjectInfo,
    pub items: Vec<String>,
    pub mastery_threshold: u32,
    pub response_timeout: Duration,
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// CSV trial log
// ---------------------------------------------------------------------------

/// Durable CSV sink with per-row flush.
pub struct CsvTrialLog {
    session_dir: PathBuf,
    writer: BufWriter<File>,
    total_rows: u64,
    /// Trial presentations only; rest rows carry no index.
    trial_rows: u64,
    rows_per_stage: HashMap<String, u64>,
    started_at: SystemTime,
    session_id: String,
    config: LogConfig,
}

impl CsvTrialLog {
    /// Create the session directory and `trials.csv` with its header.
    pub fn new(config: LogConfig) -> io::Result<Self> {
        let started_at = SystemTime::now();
        let ts = started_at.duration_since(UNIX_EPOCH).unwrap_or_default();
        let dir_name = format!("{}-sub-{}", format_iso8601_compact(ts), config.subject.id);

        let session_dir = config.output_dir.join(&dir_name);
        fs::create_dir_all(&session_dir)?;

        let csv_file = File::create(session_dir.join("trials.csv"))?;
        let mut writer = BufWriter::new(csv_file);
        writeln!(writer, "{CSV_HEADER}")?;
        writer.flush()?;

        Ok(Self {
            session_dir,
            writer,
            total_rows: 0,
            trial_rows: 0,
            rows_per_stage: HashMap::new(),
            started_at,
            session_id: Uuid::new_v4().to_string(),
            config,
        })
    }

    fn write_row(&mut self, stage: Stage, fields: [String; 9]) -> io::Result<()> {
        let timestamp = format_iso8601(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default(),
        );
        let trial_index = if stage == Stage::Rest {
            NA.to_string()
        } else {
            let index = self.trial_rows.to_string();
            self.trial_rows += 1;
            index
        };

        let [block, condition, nonword, left, right, response, expected, correct, rt] = fields;
        writeln!(
            self.writer,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.config.subject.id,
            stage,
            block,
            trial_index,
            condition,
            nonword,
            left,
            right,
            response,
            expected,
            correct,
            rt,
            timestamp,
        )?;
        self.writer.flush()?;

        self.total_rows += 1;
        *self.rows_per_stage.entry(stage.to_string()).or_insert(0) += 1;
        Ok(())
    }

    /// Session directory path.
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Finalize the session, writing session.json. Call on graceful end;
    /// an aborted session keeps only its already-flushed CSV rows.
    pub fn finish(mut self, formal_passed: Option<bool>) -> io::Result<PathBuf> {
        self.writer.flush()?;

        let ended_at = SystemTime::now();
        let duration = ended_at
            .duration_since(self.started_at)
            .unwrap_or_default();

        let meta = SessionMeta {
            version: 1,
            id: self.session_id,
            subject: self.config.subject.clone(),
            started_at: format_iso8601(
                self.started_at
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default(),
            ),
            ended_at: format_iso8601(ended_at.duration_since(UNIX_EPOCH).unwrap_or_default()),
            duration_ms: duration.as_millis() as u64,
            items: self.config.items.clone(),
            mastery_threshold: self.config.mastery_threshold,
            response_timeout_ms: self.config.response_timeout.as_millis() as u64,
            total_rows: self.total_rows,
            rows_per_stage: self.rows_per_stage.clone(),
            formal_passed,
            note: self.config.note.clone(),
            trialbench_version: crate::VERSION.to_string(),
        };

        let json = serde_json::to_string_pretty(&meta).map_err(io::Error::other)?;
        fs::write(self.session_dir.join("session.json"), json)?;

        Ok(self.session_dir.clone())
    }
}

impl OutcomeSink for CsvTrialLog {
    fn append(&mut self, outcome: &TrialOutcome) -> io::Result<()> {
        let opt = |s: Option<String>| s.unwrap_or_else(|| NA.to_string());
        let fields = [
            opt(outcome.block.map(|b| b.to_string())),
            outcome.condition.to_string(),
            outcome.item_id.clone(),
            opt(outcome
                .positions
                .map(|p| p.label_on(crate::stimulus::Side::Left).to_string())),
            opt(outcome
                .positions
                .map(|p| p.label_on(crate::stimulus::Side::Right).to_string())),
            opt(outcome.response.map(|s| s.to_string())),
            opt(outcome.expected.map(|s| s.to_string())),
            if outcome.correct { "1" } else { "0" }.to_string(),
            opt(outcome
                .reaction_time
                .map(|rt| format!("{:.1}", rt.as_secs_f64() * 1000.0))),
        ];
        self.write_row(outcome.stage, fields)
    }

    fn rest(&mut self, block: usize) -> io::Result<()> {
        let na = || NA.to_string();
        let fields = [
            block.to_string(),
            na(),
            na(),
            na(),
            na(),
            na(),
            na(),
            na(),
            na(),
        ];
        self.write_row(Stage::Rest, fields)
    }
}

// ---------------------------------------------------------------------------
// Timestamp helpers
// ---------------------------------------------------------------------------

/// Compact ISO-8601 for directory names, e.g. `2026-02-15T013000Z`.
fn format_iso8601_compact(since_epoch: Duration) -> String {
    let (year, month, day, hour, min, sec) = secs_to_utc(since_epoch.as_secs());
    format!("{year:04}-{month:02}-{day:02}T{hour:02}{min:02}{sec:02}Z")
}

/// Full ISO-8601, e.g. `2026-02-15T01:30:00Z`.
pub(crate) fn format_iso8601(since_epoch: Duration) -> String {
    let (year, month, day, hour, min, sec) = secs_to_utc(since_epoch.as_secs());
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{min:02}:{sec:02}Z")
}

/// Seconds since Unix epoch to UTC fields. No leap-second handling.
fn secs_to_utc(secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    let sec = secs % 60;
    let min = (secs / 60) % 60;
    let hour = (secs / 3600) % 24;

    let mut days = secs / 86400;
    let mut year = 1970u64;
    loop {
        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    let month_days: [u64; 12] = if is_leap(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 0u64;
    for (i, &md) in month_days.iter().enumerate() {
        if days < md {
            month = i as u64 + 1;
            break;
        }
        days -= md;
    }

    (year, month, days + 1, hour, min, sec)
}

fn is_leap(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stimulus::{Label, PositionMap, StimulusItem};
    use crate::trial::{ResponseEvent, TrialContext};
    use std::time::Duration;

    fn log_config(dir: &Path) -> LogConfig {
        LogConfig {
            output_dir: dir.to_path_buf(),
            subject: SubjectInfo::new("007"),
            items: vec!["BRUKT".to_string(), "BANTE".to_string()],
            mastery_threshold: 7,
            response_timeout: Duration::from_secs(2),
            note: None,
        }
    }

    fn outcome(correct: bool) -> TrialOutcome {
        let item = StimulusItem::new("BRUKT", Label::Self_, "BRUKT.png");
        let ctx = TrialContext {
            item: &item,
            positions: PositionMap::new(Label::Self_),
            stage: Stage::Mastery,
            block: None,
        };
        let event = if correct {
            ResponseEvent::Responded {
                side: crate::stimulus::Side::Left,
                elapsed: Duration::from_millis(512),
            }
        } else {
            ResponseEvent::TimedOut
        };
        TrialOutcome::score(&ctx, &event)
    }

    #[test]
    fn creates_directory_and_header() {
        let tmp = tempfile::tempdir().unwrap();
        let log = CsvTrialLog::new(log_config(tmp.path())).unwrap();
        let dir = log.session_dir().to_path_buf();

        assert!(dir.exists());
        let csv = fs::read_to_string(dir.join("trials.csv")).unwrap();
        assert_eq!(csv.lines().next().unwrap(), CSV_HEADER);

        let result_dir = log.finish(None).unwrap();
        assert!(result_dir.join("session.json").exists());
    }

    #[test]
    fn rows_are_flushed_and_well_formed() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = CsvTrialLog::new(log_config(tmp.path())).unwrap();
        log.append(&outcome(true)).unwrap();
        log.append(&outcome(false)).unwrap();

        // Rows must be durable before finish.
        let csv = fs::read_to_string(log.session_dir().join("trials.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(first[0], "007");
        assert_eq!(first[1], "mastery");
        assert_eq!(first[2], NA); // no block
        assert_eq!(first[4], "self");
        assert_eq!(first[5], "BRUKT");
        assert_eq!(first[6], "self"); // left label
        assert_eq!(first[7], "other"); // right label
        assert_eq!(first[8], "left");
        assert_eq!(first[10], "1");
        assert_eq!(first[11], "512.0");

        let timeout: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(timeout[8], NA);
        assert_eq!(timeout[10], "0");
        assert_eq!(timeout[11], NA);
    }

    #[test]
    fn rest_rows_use_sentinels() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = CsvTrialLog::new(log_config(tmp.path())).unwrap();
        log.rest(4).unwrap();

        let csv = fs::read_to_string(log.session_dir().join("trials.csv")).unwrap();
        let row: Vec<&str> = csv.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(row[1], "rest");
        assert_eq!(row[2], "4");
        assert_eq!(row[5], NA); // no nonword
        assert_eq!(row[10], NA); // no correctness
    }

    #[test]
    fn finish_writes_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = CsvTrialLog::new(log_config(tmp.path())).unwrap();
        log.append(&outcome(true)).unwrap();
        log.rest(0).unwrap();

        let dir = log.finish(Some(true)).unwrap();
        let meta: SessionMeta =
            serde_json::from_str(&fs::read_to_string(dir.join("session.json")).unwrap()).unwrap();
        assert_eq!(meta.version, 1);
        assert_eq!(meta.subject.id, "007");
        assert_eq!(meta.total_rows, 2);
        assert_eq!(meta.mastery_threshold, 7);
        assert_eq!(*meta.rows_per_stage.get("mastery").unwrap(), 1);
        assert_eq!(*meta.rows_per_stage.get("rest").unwrap(), 1);
        assert_eq!(meta.formal_passed, Some(true));
    }

    #[test]
    fn trial_index_skips_rest_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = CsvTrialLog::new(log_config(tmp.path())).unwrap();
        log.append(&outcome(true)).unwrap();
        log.rest(0).unwrap();
        log.append(&outcome(false)).unwrap();

        let csv = fs::read_to_string(log.session_dir().join("trials.csv")).unwrap();
        let index_of = |line: &str| line.split(',').nth(3).unwrap().to_string();
        let lines: Vec<&str> = csv.lines().collect();
        // Trial ordinals stay consecutive across a rest row, which itself
        // carries no index.
        assert_eq!(index_of(lines[1]), "0");
        assert_eq!(index_of(lines[2]), NA);
        assert_eq!(index_of(lines[3]), "1");
    }

    #[test]
    fn memory_sink_records_in_order() {
        let mut sink = MemorySink::default();
        sink.append(&outcome(true)).unwrap();
        sink.append(&outcome(false)).unwrap();
        sink.rest(1).unwrap();
        assert_eq!(sink.outcomes.len(), 2);
        assert!(sink.outcomes[0].correct);
        assert!(!sink.outcomes[1].correct);
        assert_eq!(sink.rests, vec![1]);
    }

    #[test]
    fn iso8601_epoch() {
        assert_eq!(format_iso8601(Duration::from_secs(0)), "1970-01-01T00:00:00Z");
        assert_eq!(
            format_iso8601_compact(Duration::from_secs(0)),
            "1970-01-01T000000Z"
        );
    }

    #[test]
    fn iso8601_known_date() {
        // 2000-01-01 00:00:00 UTC
        assert_eq!(
            format_iso8601(Duration::from_secs(946_684_800)),
            "2000-01-01T00:00:00Z"
        );
    }
}
