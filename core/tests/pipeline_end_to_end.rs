//! End-to-end pipeline through the engine:
//! 1. Ingest → merge → daily report, with a correction batch overriding the
//!    original row (keep-last through the whole pipeline)
//! 2. Ingested files move into the processed archive
//! 3. One unreadable file does not abort its siblings
//! 4. Queries before any ingestion return the no-data signal
//! 5. Re-ingesting identical data leaves the store unchanged

use std::fs;
use std::path::Path;

use autopolicy_core::config::PipelineConfig;
use autopolicy_core::ReportEngine;
use chrono::NaiveDate;

const HEADER: &str = "policy_id,confirmed_at,premium,unit_count,commission,agent\n";

fn write_inbox(config: &PipelineConfig, name: &str, body: &str) {
    fs::create_dir_all(&config.inbox_dir).expect("create inbox");
    fs::write(config.inbox_dir.join(name), body).expect("write extract");
}

fn engine_in(dir: &Path) -> (ReportEngine, PipelineConfig) {
    let config = PipelineConfig::rooted_at(dir);
    let engine = ReportEngine::open(config.clone()).expect("open engine");
    (engine, config)
}

fn date(text: &str) -> NaiveDate {
    text.parse().expect("valid test date")
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: the correction scenario
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn correction_batch_overrides_original_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, config) = engine_in(dir.path());

    write_inbox(
        &config,
        "batch1.csv",
        &format!(
            "{HEADER}P1,2025-03-01 00:00:00,100,1,10,100231张伟\n\
             P2,2025-03-02 00:00:00,200,1,20,100232李丽\n"
        ),
    );
    let first = engine.refresh_data().expect("first ingest");
    assert_eq!(first.rows_ingested, 2);
    assert_eq!(first.store_rows, 2);

    // The later extract re-states P1 for the same confirmation timestamp
    // with a corrected premium (date-only form, same midnight instant).
    write_inbox(
        &config,
        "batch2.csv",
        &format!("{HEADER}P1,2025-03-01,150,1,15,100231张伟\n"),
    );
    let second = engine.refresh_data().expect("second ingest");
    assert_eq!(second.store_rows, 2, "correction replaces, never adds");

    let report = engine
        .daily_report(Some(date("2025-03-01")))
        .expect("query ok")
        .expect("data exists");

    assert_eq!(report.premium, 150.0, "the corrected premium wins, not 250");
    assert_eq!(report.policy_count, 1, "one record for that day");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: archive moves
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn ingested_files_move_to_the_processed_archive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, config) = engine_in(dir.path());

    write_inbox(
        &config,
        "extract.csv",
        &format!("{HEADER}P1,2025-03-01 00:00:00,100,1,10,100231张伟\n"),
    );
    engine.refresh_data().expect("ingest");

    assert!(
        !config.inbox_dir.join("extract.csv").exists(),
        "the source file must leave the inbox"
    );
    let archived: Vec<String> = fs::read_dir(&config.processed_dir)
        .expect("archive exists")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(archived.len(), 1);
    assert!(
        archived[0].starts_with("extract_processed_"),
        "archived name carries the timestamp suffix: {archived:?}"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: per-file failure isolation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn unreadable_file_does_not_abort_siblings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, config) = engine_in(dir.path());

    write_inbox(&config, "broken.xlsx", "this is not a spreadsheet");
    write_inbox(
        &config,
        "good.csv",
        &format!("{HEADER}P1,2025-03-01 00:00:00,100,1,10,100231张伟\n"),
    );

    let report = engine.refresh_data().expect("scan succeeds overall");

    assert_eq!(report.processed.len(), 1, "the good file is merged");
    assert_eq!(report.failed.len(), 1, "the bad file is reported");
    assert!(report.failed[0].file.ends_with("broken.xlsx"));
    assert_eq!(report.store_rows, 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: missing store is "no data", not an error
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn queries_before_first_ingest_signal_no_data() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, _) = engine_in(dir.path());

    assert!(engine.daily_report(None).expect("query ok").is_none());
    assert!(engine.latest_date().expect("query ok").is_none());
    assert!(engine.week_trend(None, 1).expect("query ok").is_empty());
    assert!(engine.validation_report().expect("query ok").is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: idempotent re-ingestion
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn reingesting_identical_data_changes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, config) = engine_in(dir.path());
    let body = format!(
        "{HEADER}P1,2025-03-01 00:00:00,100,1,10,100231张伟\n\
         P2,2025-03-02 00:00:00,200,1,20,100232李丽\n"
    );

    write_inbox(&config, "batch.csv", &body);
    let first = engine.refresh_data().expect("first ingest");

    write_inbox(&config, "batch_again.csv", &body);
    let second = engine.refresh_data().expect("second ingest");

    assert_eq!(first.store_rows, 2);
    assert_eq!(second.store_rows, 2, "identical rows dedupe away");

    let latest = engine.latest_date().expect("query ok").expect("has data");
    assert_eq!(latest, date("2025-03-02"));
}
