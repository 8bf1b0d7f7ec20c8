//! Categorical and bucket distributions over an anchored period.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::Window;
use crate::column::ColumnId;
use crate::filter::{apply, apply_scope, DataScope, FilterSpec};
use crate::mapping::AgentDirectory;
use crate::record::Dataset;

/// Canonical reporting periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    Last7d,
    Last30d,
}

impl Period {
    pub fn days(self) -> i64 {
        match self {
            Period::Day => 1,
            Period::Last7d => 7,
            Period::Last30d => 30,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Last7d => "last7d",
            Period::Last30d => "last30d",
        }
    }

    pub fn parse(text: &str) -> Option<Period> {
        match text {
            "day" => Some(Period::Day),
            "last7d" => Some(Period::Last7d),
            "last30d" => Some(Period::Last30d),
            _ => None,
        }
    }

    fn date_range_label(self, window: &Window) -> String {
        match self {
            Period::Day => window.anchor.to_string(),
            _ => format!("{} ~ {}", window.start(), window.anchor),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionKind {
    StaffPerformance,
    PremiumRange,
    InsuranceType,
    RenewalType,
}

impl DistributionKind {
    pub fn parse(text: &str) -> Option<DistributionKind> {
        match text {
            "staff_performance" => Some(DistributionKind::StaffPerformance),
            "premium_range" => Some(DistributionKind::PremiumRange),
            "insurance_type" => Some(DistributionKind::InsuranceType),
            "renewal_type" => Some(DistributionKind::RenewalType),
            _ => None,
        }
    }
}

/// One bucket row of a distribution result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionBucket {
    pub label: String,
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium: Option<f64>,
    /// Share of the period total, rounded to one decimal.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionReport {
    pub kind: DistributionKind,
    pub period: Period,
    pub date_range: String,
    pub buckets: Vec<DistributionBucket>,
    pub total_count: i64,
    pub total_premium: f64,
    /// Column the renewal mix actually grouped by (fallback is possible).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_used: Option<String>,
}

/// Per-agent daily premium thresholds. Scaled by the period length because a
/// longer window accumulates proportionally more volume per agent.
const DAILY_BOUNDS: [(f64, f64); 6] = [
    (f64::NEG_INFINITY, 0.0),
    (0.0, 5_000.0),
    (5_000.0, 15_000.0),
    (15_000.0, 20_000.0),
    (20_000.0, 30_000.0),
    (30_000.0, f64::INFINITY),
];

#[derive(Debug, Default)]
struct Buckets {
    buckets: Vec<DistributionBucket>,
    total_count: i64,
    total_premium: f64,
    field_used: Option<String>,
}

/// Compute the requested distribution over the anchored period. `None` means
/// no anchor date could be determined; an empty period yields all-zero
/// buckets instead.
pub fn distribution(
    dataset: &Dataset,
    kind: DistributionKind,
    period: Period,
    date: Option<NaiveDate>,
    spec: &FilterSpec,
    scope: DataScope,
    directory: &AgentDirectory,
) -> Option<DistributionReport> {
    let scoped = apply_scope(dataset, scope);
    let filtered = apply(&scoped, spec, directory);
    let anchor = date.or_else(|| filtered.latest_day())?;
    let window = Window::new(anchor, period.days());
    let slice = window.slice(&filtered);

    let result = match kind {
        DistributionKind::StaffPerformance => staff_buckets(&slice, period, false),
        DistributionKind::PremiumRange => staff_buckets(&slice, period, true),
        DistributionKind::InsuranceType => categorical(&slice, ColumnId::Combination),
        DistributionKind::RenewalType => renewal(&slice),
    };

    Some(DistributionReport {
        kind,
        period,
        date_range: period.date_range_label(&window),
        buckets: result.buckets,
        total_count: result.total_count,
        total_premium: result.total_premium,
        field_used: result.field_used,
    })
}

// ── Per-agent premium buckets ────────────────────────────────────────────────

fn staff_buckets(slice: &Dataset, period: Period, with_premium: bool) -> Buckets {
    let mut per_agent: BTreeMap<&str, f64> = BTreeMap::new();
    if slice.has_column(ColumnId::AgentKey) {
        for row in &slice.rows {
            *per_agent.entry(row.agent_key.as_str()).or_default() += row.premium_or_zero();
        }
    } else if !slice.is_empty() {
        log::warn!("staff distribution has no agent column; reporting zero buckets");
    }

    let total_staff = per_agent.len();
    let total_premium: f64 = per_agent.values().sum();
    let days = period.days();

    let mut buckets = Vec::with_capacity(DAILY_BOUNDS.len());
    for (lo, hi) in DAILY_BOUNDS {
        let lo = scale_bound(lo, days);
        let hi = scale_bound(hi, days);
        let members: Vec<f64> = per_agent
            .values()
            .copied()
            .filter(|premium| in_bucket(*premium, lo, hi))
            .collect();
        buckets.push(DistributionBucket {
            label: bound_label(lo, hi),
            count: members.len() as i64,
            premium: with_premium.then(|| members.iter().sum()),
            percentage: pct(members.len() as f64, total_staff as f64),
        });
    }

    Buckets {
        buckets,
        total_count: total_staff as i64,
        total_premium,
        field_used: None,
    }
}

fn scale_bound(bound: f64, days: i64) -> f64 {
    if bound.is_finite() {
        bound * days as f64
    } else {
        bound
    }
}

fn in_bucket(value: f64, lo: f64, hi: f64) -> bool {
    if hi == f64::INFINITY {
        value >= lo
    } else if lo == f64::NEG_INFINITY {
        value < hi
    } else {
        value >= lo && value < hi
    }
}

fn bound_label(lo: f64, hi: f64) -> String {
    if lo == f64::NEG_INFINITY {
        return "<0".to_string();
    }
    if hi == f64::INFINITY {
        return format!(">={}k", format_k(lo));
    }
    format!("{}-{}k", format_k(lo), format_k(hi))
}

fn format_k(value: f64) -> String {
    let k = value / 1000.0;
    if k.fract() == 0.0 {
        format!("{}", k as i64)
    } else {
        format!("{k:.1}")
    }
}

// ── Categorical mixes ────────────────────────────────────────────────────────

fn categorical(slice: &Dataset, column: ColumnId) -> Buckets {
    if !slice.has_column(column) {
        log::warn!(
            "distribution by {} skipped: column absent from store",
            column.header()
        );
        return Buckets::default();
    }

    let mut groups: BTreeMap<&str, (i64, f64)> = BTreeMap::new();
    for row in &slice.rows {
        let entry = groups.entry(row.text(column)).or_default();
        entry.0 += row.units_or_zero();
        entry.1 += row.premium_or_zero();
    }

    let total_count: i64 = groups.values().map(|g| g.0).sum();
    let total_premium: f64 = groups.values().map(|g| g.1).sum();

    let mut buckets: Vec<DistributionBucket> = groups
        .into_iter()
        .map(|(label, (count, premium))| DistributionBucket {
            label: label.to_string(),
            count,
            premium: Some(premium),
            percentage: pct(count as f64, total_count as f64),
        })
        .collect();

    // Largest premium first.
    buckets.sort_by(|a, b| {
        b.premium
            .partial_cmp(&a.premium)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Buckets {
        buckets,
        total_count,
        total_premium,
        field_used: None,
    }
}

fn renewal(slice: &Dataset) -> Buckets {
    let column = if slice.has_column(ColumnId::RenewalStatus) {
        ColumnId::RenewalStatus
    } else if slice.has_column(ColumnId::BusinessClass) {
        ColumnId::BusinessClass
    } else {
        log::warn!("renewal distribution skipped: no renewal or business-class column");
        return Buckets::default();
    };
    let mut result = categorical(slice, column);
    result.field_used = Some(column.header().to_string());
    result
}

fn pct(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    (part / whole * 1000.0).round() / 10.0
}
