//! Distribution reports:
//! 1. Daily bucket thresholds scale with the window length
//! 2. An empty period yields all-zero buckets, not an error
//! 3. The insurance-type mix sorts by premium and degrades without its column
//! 4. The renewal mix falls back to the business classification
//! 5. Percentages carry one decimal of the period total

use std::collections::BTreeSet;

use autopolicy_core::column::ColumnId;
use autopolicy_core::distribution::{distribution, DistributionKind, Period};
use autopolicy_core::filter::{DataScope, FilterSpec};
use autopolicy_core::mapping::AgentDirectory;
use autopolicy_core::record::{Dataset, PolicyRecord};
use chrono::NaiveDate;

fn date(text: &str) -> NaiveDate {
    text.parse().expect("valid test date")
}

fn sale(agent: &str, day: &str, premium: f64) -> PolicyRecord {
    PolicyRecord {
        policy_id: format!("P-{agent}-{day}"),
        agent_key: agent.to_string(),
        confirmed_at: date(day).and_hms_opt(10, 0, 0),
        premium: Some(premium),
        unit_count: Some(1),
        ..PolicyRecord::default()
    }
}

fn dataset(rows: Vec<PolicyRecord>) -> Dataset {
    Dataset::new(ColumnId::ALL.iter().copied().collect(), rows)
}

fn run(
    data: &Dataset,
    kind: DistributionKind,
    period: Period,
    anchor: &str,
) -> autopolicy_core::distribution::DistributionReport {
    distribution(
        data,
        kind,
        period,
        Some(date(anchor)),
        &FilterSpec::default(),
        DataScope::ExcludeCorrections,
        &AgentDirectory::default(),
    )
    .expect("anchor given, report exists")
}

fn bucket_count(report: &autopolicy_core::distribution::DistributionReport, label: &str) -> i64 {
    report
        .buckets
        .iter()
        .find(|b| b.label == label)
        .unwrap_or_else(|| panic!("bucket {label} missing"))
        .count
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: threshold scaling
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn daily_thresholds_scale_to_the_window_length() {
    // One agent selling 30k over seven days: a ">=30k" performer by the
    // daily table, but only "0-35k" once the thresholds cover a week.
    let rows: Vec<PolicyRecord> = (1..=6)
        .map(|day| sale("100231张伟", &format!("2025-03-0{day}"), 5_000.0))
        .collect();
    let data = dataset(rows);

    let weekly = run(
        &data,
        DistributionKind::StaffPerformance,
        Period::Last7d,
        "2025-03-07",
    );

    assert_eq!(weekly.total_count, 1);
    assert_eq!(bucket_count(&weekly, "0-35k"), 1);
    assert_eq!(bucket_count(&weekly, ">=210k"), 0);
}

#[test]
fn single_day_uses_unscaled_thresholds() {
    let data = dataset(vec![sale("100231张伟", "2025-03-01", 30_000.0)]);

    let daily = run(
        &data,
        DistributionKind::StaffPerformance,
        Period::Day,
        "2025-03-01",
    );

    assert_eq!(bucket_count(&daily, ">=30k"), 1);
    assert_eq!(bucket_count(&daily, "0-5k"), 0);
}

#[test]
fn negative_premium_agents_land_in_the_refund_bucket() {
    let data = dataset(vec![
        sale("100231张伟", "2025-03-01", -200.0),
        sale("100232李丽", "2025-03-01", 1_000.0),
    ]);

    let daily = run(
        &data,
        DistributionKind::StaffPerformance,
        Period::Day,
        "2025-03-01",
    );

    assert_eq!(bucket_count(&daily, "<0"), 1);
    assert_eq!(bucket_count(&daily, "0-5k"), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: empty period
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn empty_period_reports_all_zero_buckets() {
    let data = dataset(vec![sale("100231张伟", "2025-03-01", 1_000.0)]);

    // Anchor far away from any data.
    let report = run(
        &data,
        DistributionKind::StaffPerformance,
        Period::Day,
        "2025-06-01",
    );

    assert_eq!(report.buckets.len(), 6);
    assert!(report.buckets.iter().all(|b| b.count == 0));
    assert_eq!(report.total_count, 0);
    assert_eq!(report.total_premium, 0.0);
}

#[test]
fn no_anchor_at_all_is_no_data() {
    let empty = dataset(Vec::new());
    let report = distribution(
        &empty,
        DistributionKind::StaffPerformance,
        Period::Day,
        None,
        &FilterSpec::default(),
        DataScope::ExcludeCorrections,
        &AgentDirectory::default(),
    );
    assert!(report.is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: insurance-type mix
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn insurance_type_mix_sorts_by_premium_desc() {
    let mut a = sale("100231张伟", "2025-03-01", 1_000.0);
    a.combination = "mandatory_only".to_string();
    let mut b = sale("100232李丽", "2025-03-01", 5_000.0);
    b.combination = "full_coverage".to_string();
    let mut c = sale("100300王强", "2025-03-01", 2_000.0);
    c.combination = "full_coverage".to_string();
    let data = dataset(vec![a, b, c]);

    let report = run(
        &data,
        DistributionKind::InsuranceType,
        Period::Day,
        "2025-03-01",
    );

    assert_eq!(report.buckets[0].label, "full_coverage");
    assert_eq!(report.buckets[0].premium, Some(7_000.0));
    assert_eq!(report.buckets[0].count, 2);
    assert_eq!(report.buckets[1].label, "mandatory_only");
    assert_eq!(report.total_count, 3);
}

#[test]
fn insurance_type_without_column_degrades_to_empty() {
    let columns: BTreeSet<ColumnId> = [
        ColumnId::PolicyId,
        ColumnId::ConfirmedAt,
        ColumnId::Premium,
        ColumnId::UnitCount,
        ColumnId::AgentKey,
    ]
    .into_iter()
    .collect();
    let data = Dataset::new(columns, vec![sale("100231张伟", "2025-03-01", 1_000.0)]);

    let report = run(
        &data,
        DistributionKind::InsuranceType,
        Period::Day,
        "2025-03-01",
    );

    assert!(report.buckets.is_empty());
    assert_eq!(report.total_count, 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: renewal mix fallback
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn renewal_mix_falls_back_to_business_class() {
    let columns: BTreeSet<ColumnId> = [
        ColumnId::PolicyId,
        ColumnId::ConfirmedAt,
        ColumnId::Premium,
        ColumnId::UnitCount,
        ColumnId::AgentKey,
        ColumnId::BusinessClass,
    ]
    .into_iter()
    .collect();
    let mut a = sale("100231张伟", "2025-03-01", 1_000.0);
    a.business_class = "renewal".to_string();
    let mut b = sale("100232李丽", "2025-03-01", 2_000.0);
    b.business_class = "new".to_string();
    let data = Dataset::new(columns, vec![a, b]);

    let report = run(&data, DistributionKind::RenewalType, Period::Day, "2025-03-01");

    assert_eq!(report.field_used.as_deref(), Some("business_class"));
    assert_eq!(report.buckets.len(), 2);
}

#[test]
fn renewal_mix_prefers_the_renewal_column() {
    let mut a = sale("100231张伟", "2025-03-01", 1_000.0);
    a.renewal_status = "renewal".to_string();
    a.business_class = "ignored".to_string();
    let data = dataset(vec![a]);

    let report = run(&data, DistributionKind::RenewalType, Period::Day, "2025-03-01");

    assert_eq!(report.field_used.as_deref(), Some("renewal_status"));
    assert_eq!(report.buckets[0].label, "renewal");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: percentages
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn percentages_round_to_one_decimal() {
    let data = dataset(vec![
        sale("100231张伟", "2025-03-01", 1_000.0),
        sale("100232李丽", "2025-03-01", 2_000.0),
        sale("100300王强", "2025-03-01", 40_000.0),
    ]);

    let report = run(
        &data,
        DistributionKind::PremiumRange,
        Period::Day,
        "2025-03-01",
    );

    let small = report
        .buckets
        .iter()
        .find(|b| b.label == "0-5k")
        .expect("bucket exists");
    assert_eq!(small.count, 2);
    assert_eq!(small.percentage, 66.7, "2 of 3 agents, one decimal");
    assert_eq!(small.premium, Some(3_000.0));
    assert_eq!(report.total_premium, 43_000.0);
}
