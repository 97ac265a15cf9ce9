//! Integration tests for trialbench-core.
//!
//! These tests drive full sessions through the public API:
//! pool construction → scheduling → trial loop → durable log.

use std::fs;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;

use trialbench_core::record::CSV_HEADER;
use trialbench_core::stimulus::{Label, StimulusItem};
use trialbench_core::{
    CsvTrialLog, FormalConfig, LogConfig, MemorySink, NullPresenter, ScriptedEvent,
    ScriptedResponder, SessionConfig, SessionError, SessionMeta, SimulatedResponder,
    Stage, SubjectInfo, TrialPool, run_formal_test, run_mastery_session,
    run_retest_session, run_study_phase,
};

fn pool(ids: &[&str]) -> TrialPool {
    let items = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let label = if i % 2 == 0 { Label::Self_ } else { Label::Other };
            StimulusItem::new(*id, label, format!("{id}.png"))
        })
        .collect();
    TrialPool::new(items).unwrap()
}

#[test]
fn mastery_with_threshold_one_tests_each_item_exactly_once() {
    let pool = pool(&["A", "B"]);
    let config = SessionConfig {
        mastery_threshold: 1,
        ..SessionConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(17);
    let mut responder = ScriptedResponder::always(ScriptedEvent::Correct);
    let mut sink = MemorySink::default();

    let summary = run_mastery_session(
        &pool,
        &config,
        &mut rng,
        &mut NullPresenter,
        &mut responder,
        &mut sink,
    )
    .unwrap();

    assert_eq!(summary.trials, 2);
    let mut ids: Vec<&str> = sink.outcomes.iter().map(|o| o.item_id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, ["A", "B"]);
}

#[test]
fn mastery_counts_only_correct_responses() {
    // Single item, threshold 3: incorrect, timeout, correct, correct leaves
    // the item one short; a fifth correct trial completes the session.
    let pool = pool(&["A"]);
    let config = SessionConfig {
        mastery_threshold: 3,
        ..SessionConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(3);
    let mut responder = ScriptedResponder::new(vec![
        ScriptedEvent::Incorrect,
        ScriptedEvent::Timeout,
        ScriptedEvent::Correct,
        ScriptedEvent::Correct,
        ScriptedEvent::Correct,
    ]);
    let mut sink = MemorySink::default();

    let summary = run_mastery_session(
        &pool,
        &config,
        &mut rng,
        &mut NullPresenter,
        &mut responder,
        &mut sink,
    )
    .unwrap();

    assert_eq!(summary.trials, 5);
    let corrects: Vec<bool> = sink.outcomes.iter().map(|o| o.correct).collect();
    assert_eq!(corrects, [false, false, true, true, true]);
    // The timeout trial has no response and no reaction time.
    assert_eq!(sink.outcomes[1].response, None);
    assert_eq!(sink.outcomes[1].reaction_time, None);
}

#[test]
fn mastery_completion_implies_threshold_for_every_item() {
    let pool = pool(&["NW01", "NW02", "NW03", "NW04"]);
    let config = SessionConfig {
        mastery_threshold: 3,
        ..SessionConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(42);
    // Imperfect participant: the loop must keep re-drawing missed items.
    let mut responder = SimulatedResponder::new(0.75, 1).with_timeout_rate(0.05);
    let mut sink = MemorySink::default();

    run_mastery_session(
        &pool,
        &config,
        &mut rng,
        &mut NullPresenter,
        &mut responder,
        &mut sink,
    )
    .unwrap();

    for id in ["NW01", "NW02", "NW03", "NW04"] {
        let correct = sink
            .outcomes
            .iter()
            .filter(|o| o.item_id == id && o.correct)
            .count();
        assert!(correct >= 3, "item {id} finished with {correct} correct");
    }
}

#[test]
fn retest_ends_with_a_clean_pass() {
    let pool = pool(&["A", "B", "C", "D"]);
    let config = SessionConfig::default();
    let mut rng = StdRng::seed_from_u64(8);
    let mut responder = SimulatedResponder::new(0.6, 2).with_timeout_rate(0.0);
    let mut sink = MemorySink::default();

    let summary = run_retest_session(
        &pool,
        &config,
        &mut rng,
        &mut NullPresenter,
        &mut responder,
        &mut sink,
    )
    .unwrap();

    // The final round re-ran every remaining miss without error.
    let last_round_len = sink
        .outcomes
        .iter()
        .rev()
        .take_while(|o| o.correct)
        .count();
    assert!(last_round_len >= 1);
    assert!(summary.rounds >= 1);
    assert_eq!(summary.trials, sink.outcomes.len());
}

#[test]
fn full_session_produces_durable_csv_and_metadata() {
    let pool = pool(&["BRUKT", "BANTE", "KLUPS", "DONTE"]);
    let session_config = SessionConfig {
        mastery_threshold: 2,
        study_repetitions: 2,
        ..SessionConfig::default()
    };
    let formal_config = FormalConfig {
        n_blocks: 3,
        trials_per_block: 8,
        required_accuracy: 0.9,
        trailing_blocks: 3,
        response_timeout: Duration::from_secs(2),
    };

    let tmp = tempfile::tempdir().unwrap();
    let mut log = CsvTrialLog::new(LogConfig {
        output_dir: tmp.path().to_path_buf(),
        subject: SubjectInfo::new("042"),
        items: pool.ids().map(str::to_string).collect(),
        mastery_threshold: session_config.mastery_threshold,
        response_timeout: session_config.response_timeout,
        note: Some("integration".to_string()),
    })
    .unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let mut responder = ScriptedResponder::always(ScriptedEvent::Correct);

    let presented = run_study_phase(
        &pool,
        &session_config,
        &mut NullPresenter,
        &mut responder,
        &mut log,
    )
    .unwrap();
    assert_eq!(presented, 8);

    let mastery = run_mastery_session(
        &pool,
        &session_config,
        &mut rng,
        &mut NullPresenter,
        &mut responder,
        &mut log,
    )
    .unwrap();
    assert_eq!(mastery.trials, 8);

    let formal = run_formal_test(
        &pool,
        &formal_config,
        &mut rng,
        &mut NullPresenter,
        &mut responder,
        &mut log,
    )
    .unwrap();
    assert!(formal.passed);

    let dir = log.finish(Some(formal.passed)).unwrap();

    // 8 study + 8 mastery + 24 formal + 2 rest rows, plus the header.
    let csv = fs::read_to_string(dir.join("trials.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 1 + 8 + 8 + 24 + 2);
    assert_eq!(
        lines.iter().filter(|l| l.contains(",rest,")).count(),
        2,
        "one rest row between each pair of formal blocks"
    );

    let meta: SessionMeta =
        serde_json::from_str(&fs::read_to_string(dir.join("session.json")).unwrap()).unwrap();
    assert_eq!(meta.subject.id, "042");
    assert_eq!(meta.total_rows, 42);
    assert_eq!(meta.formal_passed, Some(true));
    assert_eq!(*meta.rows_per_stage.get("study").unwrap(), 8);
    assert_eq!(*meta.rows_per_stage.get("mastery").unwrap(), 8);
    assert_eq!(*meta.rows_per_stage.get("formal").unwrap(), 24);
    assert_eq!(*meta.rows_per_stage.get("rest").unwrap(), 2);
}

#[test]
fn abort_mid_formal_keeps_flushed_rows_and_writes_no_metadata() {
    let pool = pool(&["A", "B"]);
    let formal_config = FormalConfig {
        n_blocks: 2,
        trials_per_block: 4,
        required_accuracy: 0.9,
        trailing_blocks: 2,
        response_timeout: Duration::from_secs(2),
    };

    let tmp = tempfile::tempdir().unwrap();
    let mut log = CsvTrialLog::new(LogConfig {
        output_dir: tmp.path().to_path_buf(),
        subject: SubjectInfo::new("013"),
        items: vec!["A".to_string(), "B".to_string()],
        mastery_threshold: 7,
        response_timeout: Duration::from_secs(2),
        note: None,
    })
    .unwrap();
    let dir = log.session_dir().to_path_buf();

    let mut rng = StdRng::seed_from_u64(5);
    let mut responder = ScriptedResponder::new(vec![
        ScriptedEvent::Correct,
        ScriptedEvent::Correct,
        ScriptedEvent::Abort,
    ]);

    let err = run_formal_test(
        &pool,
        &formal_config,
        &mut rng,
        &mut NullPresenter,
        &mut responder,
        &mut log,
    )
    .unwrap_err();
    assert!(matches!(err, SessionError::Aborted));

    // The two completed trials survived; no session.json without finish.
    drop(log);
    let csv = fs::read_to_string(dir.join("trials.csv")).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(!dir.join("session.json").exists());
}

#[test]
fn study_rows_carry_stage_and_dwell_time() {
    let pool = pool(&["A", "B"]);
    let config = SessionConfig {
        study_repetitions: 1,
        ..SessionConfig::default()
    };
    let mut responder = ScriptedResponder::always(ScriptedEvent::Correct);
    let mut sink = MemorySink::default();

    run_study_phase(&pool, &config, &mut NullPresenter, &mut responder, &mut sink).unwrap();

    assert!(sink.outcomes.iter().all(|o| o.stage == Stage::Study));
    assert!(sink.outcomes.iter().all(|o| o.reaction_time.is_some()));
    assert!(sink.outcomes.iter().all(|o| o.positions.is_none()));
}
