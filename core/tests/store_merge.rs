//! Consolidation store behaviour:
//! 1. Merging the same batch twice changes nothing (idempotence)
//! 2. Conflicting rows keep the later-ingested version
//! 3. A missing key column disables dedup instead of failing
//! 4. Save/load round-trips through the CSV file
//! 5. Saves replace the file atomically (no temp file left behind)

use std::collections::BTreeSet;

use autopolicy_core::column::ColumnId;
use autopolicy_core::record::{Dataset, PolicyRecord};
use autopolicy_core::store::{merge, ConsolidatedStore};
use chrono::NaiveDate;

fn full_columns() -> BTreeSet<ColumnId> {
    ColumnId::ALL.iter().copied().collect()
}

fn row(policy: &str, day: &str, premium: f64) -> PolicyRecord {
    let date: NaiveDate = day.parse().expect("valid test date");
    PolicyRecord {
        policy_id: policy.to_string(),
        confirmed_at: date.and_hms_opt(0, 0, 0),
        premium: Some(premium),
        unit_count: Some(1),
        agent_key: "100231张伟".to_string(),
        ..PolicyRecord::default()
    }
}

fn dataset(rows: Vec<PolicyRecord>) -> Dataset {
    Dataset::new(full_columns(), rows)
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: dedup idempotence
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn merging_same_batch_twice_is_idempotent() {
    let batch = dataset(vec![
        row("P1", "2025-03-01", 100.0),
        row("P2", "2025-03-02", 200.0),
    ]);

    let once = merge(Dataset::default(), batch.clone());
    let twice = merge(once.clone(), batch);

    assert_eq!(once.rows.len(), 2);
    assert_eq!(
        once, twice,
        "re-merging an already ingested batch must not change the store"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: keep-last-wins on (policy_id, confirmed_at)
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn conflicting_row_keeps_latest_ingested_version() {
    let first = dataset(vec![row("P1", "2025-03-01", 100.0)]);
    let correction = dataset(vec![row("P1", "2025-03-01", 150.0)]);

    let merged = merge(first, correction);

    assert_eq!(merged.rows.len(), 1, "exactly one row must survive");
    assert_eq!(
        merged.rows[0].premium,
        Some(150.0),
        "the later batch overrides the earlier one"
    );
}

#[test]
fn duplicates_inside_one_batch_keep_the_last_occurrence() {
    let batch = dataset(vec![
        row("P1", "2025-03-01", 100.0),
        row("P1", "2025-03-01", 150.0),
        row("P2", "2025-03-02", 200.0),
    ]);

    let merged = merge(Dataset::default(), batch);

    assert_eq!(merged.rows.len(), 2);
    let p1 = merged
        .rows
        .iter()
        .find(|r| r.policy_id == "P1")
        .expect("P1 survives");
    assert_eq!(p1.premium, Some(150.0));
}

#[test]
fn different_timestamps_are_different_records() {
    let batch = dataset(vec![
        row("P1", "2025-03-01", 100.0),
        row("P1", "2025-03-02", 150.0),
    ]);

    let merged = merge(Dataset::default(), batch);

    assert_eq!(
        merged.rows.len(),
        2,
        "endorsements reuse the policy id; only the (id, timestamp) pair is unique"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: defensive fallback without key columns
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn missing_key_column_disables_dedup() {
    let columns: BTreeSet<ColumnId> = [ColumnId::PolicyId, ColumnId::Premium]
        .into_iter()
        .collect();
    let rows = vec![row("P1", "2025-03-01", 100.0), row("P1", "2025-03-01", 100.0)];
    let batch = Dataset::new(columns, rows);

    let merged = merge(Dataset::default(), batch);

    assert_eq!(
        merged.rows.len(),
        2,
        "without a confirmed_at column no dedup may happen"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests 4 & 5: persistence round-trip, atomic replace
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ConsolidatedStore::new(dir.path().join("store.csv"));

    let mut special = row("P3", "2025-03-03", -50.0);
    special.endorsement_type = "correction".to_string();
    special.commission = None;

    let original = dataset(vec![
        row("P1", "2025-03-01", 100.0),
        row("P2", "2025-03-02", 200.5),
        special,
    ]);

    store.save(&original).expect("save");
    let loaded = store.load().expect("load").expect("store exists");

    assert_eq!(loaded, original, "CSV round-trip must preserve the dataset");
}

#[test]
fn load_without_prior_ingest_is_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ConsolidatedStore::new(dir.path().join("store.csv"));

    assert!(store.load().expect("load").is_none());
}

#[test]
fn save_replaces_the_file_atomically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("store.csv");
    let store = ConsolidatedStore::new(path.clone());

    store
        .save(&dataset(vec![row("P1", "2025-03-01", 100.0)]))
        .expect("first save");
    store
        .save(&dataset(vec![row("P1", "2025-03-01", 150.0)]))
        .expect("second save");

    assert!(path.exists(), "store file must exist after save");
    assert!(
        !path.with_extension("csv.tmp").exists(),
        "temp file must be renamed away"
    );

    let loaded = store.load().expect("load").expect("store exists");
    assert_eq!(loaded.rows[0].premium, Some(150.0));
}
