//! Time-window aggregation: KPI windows, week-over-week comparison, trends.
//!
//! Windows are backward-inclusive and day-granular: a 7-day window anchored
//! at D covers the calendar dates [D-6, D]. Both sides of every boundary
//! comparison are normalized to dates first, so sub-day timestamp noise can
//! never shift a row across a boundary.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::column::ColumnId;
use crate::filter::{apply, apply_scope, DataScope, FilterSpec};
use crate::mapping::AgentDirectory;
use crate::record::{Dataset, PolicyRecord};
use crate::validate::{self, ValidationSummary};
use crate::vocab;

/// Minimum premium for a row to count as a real policy in count-metric
/// comparisons. Smaller rows are negligible or corrective entries.
pub const COUNT_METRIC_MIN_PREMIUM: f64 = 50.0;

const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// A backward-inclusive, day-granularity window ending at `anchor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub anchor: NaiveDate,
    pub days: i64,
}

impl Window {
    pub fn new(anchor: NaiveDate, days: i64) -> Self {
        Self { anchor, days: days.max(1) }
    }

    /// First day inside the window.
    pub fn start(&self) -> NaiveDate {
        self.anchor - Duration::days(self.days - 1)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start() && day <= self.anchor
    }

    /// Rows whose confirmation day falls inside the window.
    pub fn slice(&self, dataset: &Dataset) -> Dataset {
        dataset.select(|row| row.confirmed_day().is_some_and(|d| self.contains(d)))
    }
}

/// One value per canonical window length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerWindow<T> {
    pub day: T,
    pub last7d: T,
    pub last30d: T,
}

/// Premium-share and unit-share of one categorical slice, per window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatioPair {
    pub premium: PerWindow<f64>,
    pub count: PerWindow<f64>,
}

/// The categorical slices reported alongside the KPI block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiRatios {
    pub telesales: RatioPair,
    pub new_energy: RatioPair,
    pub transfer: RatioPair,
    pub mandatory: RatioPair,
    pub commercial: RatioPair,
    pub non_local: RatioPair,
    pub single_mandatory: RatioPair,
    pub new_policy: RatioPair,
    pub loss_business: RatioPair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiWindows {
    pub anchor_date: NaiveDate,
    pub premium: PerWindow<f64>,
    pub policy_count: PerWindow<i64>,
    pub commission: PerWindow<f64>,
    pub target_gap_day: f64,
    pub ratios: KpiRatios,
    pub validation: ValidationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub premium: f64,
    pub policy_count: i64,
    pub commission: f64,
    pub target_gap: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub weekday: String,
    pub premium: f64,
    pub policy_count: i64,
}

/// Metric aggregated per weekday slot in the comparison chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMetric {
    Premium,
    Count,
}

impl ComparisonMetric {
    pub fn parse(text: &str) -> Option<ComparisonMetric> {
        match text {
            "premium" => Some(ComparisonMetric::Premium),
            "count" => Some(ComparisonMetric::Count),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekSeries {
    /// Display label, e.g. "D-7 (03-01): 412k".
    pub name: String,
    /// Period code: "D", "D-7" or "D-14".
    pub code: String,
    /// One value per weekday slot, missing days filled with 0.
    pub data: Vec<f64>,
    pub dates: Vec<NaiveDate>,
    pub total_value: f64,
    pub period_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekComparison {
    pub latest_date: NaiveDate,
    /// Weekday labels, starting at the current window's first day.
    pub x_axis: Vec<String>,
    /// Oldest period first.
    pub series: Vec<WeekSeries>,
    pub validation: ValidationSummary,
}

// ── Sums & ratios ────────────────────────────────────────────────────────────

fn premium_sum(dataset: &Dataset) -> f64 {
    dataset.rows.iter().map(PolicyRecord::premium_or_zero).sum()
}

fn unit_sum(dataset: &Dataset) -> i64 {
    dataset.rows.iter().map(PolicyRecord::units_or_zero).sum()
}

fn commission_sum(dataset: &Dataset) -> f64 {
    dataset.rows.iter().map(PolicyRecord::commission_or_zero).sum()
}

/// Share of `numerator` in `denominator`, clamped to [0, 1].
/// A zero or negative denominator yields 0, never a division error.
fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        return 0.0;
    }
    (numerator / denominator).clamp(0.0, 1.0)
}

fn ratio_pair<F>(windows: &[Dataset; 3], predicate: F) -> RatioPair
where
    F: Fn(&Dataset, &PolicyRecord) -> bool,
{
    let premium_share = |window: &Dataset| {
        let part: f64 = window
            .rows
            .iter()
            .filter(|row| predicate(window, row))
            .map(|row| row.premium_or_zero())
            .sum();
        safe_ratio(part, premium_sum(window))
    };
    let unit_share = |window: &Dataset| {
        let part: i64 = window
            .rows
            .iter()
            .filter(|row| predicate(window, row))
            .map(|row| row.units_or_zero())
            .sum();
        safe_ratio(part as f64, unit_sum(window) as f64)
    };
    RatioPair {
        premium: PerWindow {
            day: premium_share(&windows[0]),
            last7d: premium_share(&windows[1]),
            last30d: premium_share(&windows[2]),
        },
        count: PerWindow {
            day: unit_share(&windows[0]),
            last7d: unit_share(&windows[1]),
            last30d: unit_share(&windows[2]),
        },
    }
}

// Every predicate checks column presence on the dataset it runs over, so a
// batch without the backing column contributes nothing instead of failing.

fn is_telesales(d: &Dataset, row: &PolicyRecord) -> bool {
    d.has_column(ColumnId::ChannelSource)
        && row.channel_source == vocab::TELESALES_CHANNEL
}

fn is_new_energy(d: &Dataset, row: &PolicyRecord) -> bool {
    d.has_column(ColumnId::NewEnergy) && row.new_energy == vocab::YES
}

fn is_transfer(d: &Dataset, row: &PolicyRecord) -> bool {
    d.has_column(ColumnId::OwnershipTransfer)
        && row.ownership_transfer == vocab::YES
}

fn is_non_local(d: &Dataset, row: &PolicyRecord) -> bool {
    d.has_column(ColumnId::NonLocal) && row.non_local == vocab::YES
}

fn is_mandatory(d: &Dataset, row: &PolicyRecord) -> bool {
    let by_code = d.has_column(ColumnId::InsuranceCode)
        && row.insurance_code.starts_with(vocab::MANDATORY_CODE_PREFIX);
    let by_name = d.has_column(ColumnId::InsuranceName)
        && row.insurance_name.contains(vocab::MANDATORY_NAME_MARKER);
    by_code || by_name
}

fn is_commercial(d: &Dataset, row: &PolicyRecord) -> bool {
    let by_code = d.has_column(ColumnId::InsuranceCode)
        && vocab::COMMERCIAL_CODE_PREFIXES
            .iter()
            .any(|prefix| row.insurance_code.starts_with(prefix));
    let by_name = d.has_column(ColumnId::InsuranceName)
        && row.insurance_name.contains(vocab::COMMERCIAL_NAME_MARKER);
    by_code || by_name
}

fn is_single_mandatory(d: &Dataset, row: &PolicyRecord) -> bool {
    d.has_column(ColumnId::Combination)
        && row.combination.trim() == vocab::MANDATORY_ONLY_COMBO
}

fn is_new_policy(d: &Dataset, row: &PolicyRecord) -> bool {
    d.has_column(ColumnId::RenewalStatus)
        && row.renewal_status.trim() == vocab::NEW_POLICY
}

fn is_loss_business(d: &Dataset, row: &PolicyRecord) -> bool {
    d.has_column(ColumnId::BusinessClass)
        && row.business_class.trim() == vocab::LOSS_MAKING_CLASS
}

// ── Queries ──────────────────────────────────────────────────────────────────

/// KPI figures for the three canonical windows ending at the anchor date.
/// Returns `None` when no anchor can be determined (no data after scope +
/// filters).
pub fn kpi_windows(
    dataset: &Dataset,
    date: Option<NaiveDate>,
    spec: &FilterSpec,
    scope: DataScope,
    directory: &AgentDirectory,
    daily_target: f64,
) -> Option<KpiWindows> {
    let scoped = apply_scope(dataset, scope);
    let filtered = apply(&scoped, spec, directory);
    let anchor = date.or_else(|| filtered.latest_day())?;

    let day = Window::new(anchor, 1).slice(&filtered);
    let week = Window::new(anchor, 7).slice(&filtered);
    let month = Window::new(anchor, 30).slice(&filtered);

    let premium = PerWindow {
        day: premium_sum(&day),
        last7d: premium_sum(&week),
        last30d: premium_sum(&month),
    };
    let policy_count = PerWindow {
        day: unit_sum(&day),
        last7d: unit_sum(&week),
        last30d: unit_sum(&month),
    };
    let commission = PerWindow {
        day: commission_sum(&day),
        last7d: commission_sum(&week),
        last30d: commission_sum(&month),
    };

    let windows = [day, week, month];
    let ratios = KpiRatios {
        telesales: ratio_pair(&windows, is_telesales),
        new_energy: ratio_pair(&windows, is_new_energy),
        transfer: ratio_pair(&windows, is_transfer),
        mandatory: ratio_pair(&windows, is_mandatory),
        commercial: ratio_pair(&windows, is_commercial),
        non_local: ratio_pair(&windows, is_non_local),
        single_mandatory: ratio_pair(&windows, is_single_mandatory),
        new_policy: ratio_pair(&windows, is_new_policy),
        loss_business: ratio_pair(&windows, is_loss_business),
    };

    let validation = validate::summary(&filtered, directory);

    Some(KpiWindows {
        anchor_date: anchor,
        target_gap_day: premium.day - daily_target,
        premium,
        policy_count,
        commission,
        ratios,
        validation,
    })
}

/// Three aligned 7-day series: the window ending at the anchor and the two
/// preceding non-overlapping windows.
pub fn week_comparison(
    dataset: &Dataset,
    metric: ComparisonMetric,
    spec: &FilterSpec,
    anchor: Option<NaiveDate>,
    scope: DataScope,
    directory: &AgentDirectory,
) -> Option<WeekComparison> {
    let scoped = apply_scope(dataset, scope);
    let filtered = apply(&scoped, spec, directory);
    let latest = anchor.or_else(|| filtered.latest_day())?;

    let current_start = latest - Duration::days(6);
    let first_weekday = current_start.weekday().num_days_from_monday() as usize;
    let x_axis: Vec<String> = (0..7)
        .map(|i| WEEKDAY_LABELS[(first_weekday + i) % 7].to_string())
        .collect();

    let mut series = Vec::with_capacity(3);
    for period_index in 0..3i64 {
        let window = Window::new(latest - Duration::days(7 * period_index), 7);
        let start = window.start();
        let rows = window.slice(&filtered);

        let mut data = vec![0.0f64; 7];
        for row in &rows.rows {
            let Some(day) = row.confirmed_day() else { continue };
            let slot = (day - start).num_days();
            if !(0..7).contains(&slot) {
                continue;
            }
            match metric {
                ComparisonMetric::Count => {
                    if row.premium_or_zero() >= COUNT_METRIC_MIN_PREMIUM {
                        data[slot as usize] += 1.0;
                    }
                }
                ComparisonMetric::Premium => data[slot as usize] += row.premium_or_zero(),
            }
        }

        let total_value: f64 = data.iter().sum();
        let dates: Vec<NaiveDate> = (0..7).map(|i| start + Duration::days(i)).collect();
        let code = if period_index == 0 {
            "D".to_string()
        } else {
            format!("D-{}", period_index * 7)
        };
        let total_label = match metric {
            ComparisonMetric::Count => format!("{}", total_value as i64),
            ComparisonMetric::Premium => format!("{}k", (total_value / 1000.0) as i64),
        };
        let name = format!("{code} ({}): {total_label}", window.anchor.format("%m-%d"));

        series.push(WeekSeries {
            name,
            code,
            data,
            dates,
            total_value,
            period_index: period_index as usize,
        });
    }

    series.reverse();

    let validation = validate::summary(&filtered, directory);
    Some(WeekComparison {
        latest_date: latest,
        x_axis,
        series,
        validation,
    })
}

/// Daily premium / unit totals over `weeks * 7` days ending at `end`.
/// Only days with data appear; callers fill chart gaps themselves.
pub fn week_trend(dataset: &Dataset, end: Option<NaiveDate>, weeks: u32) -> Vec<TrendPoint> {
    let Some(end) = end.or_else(|| dataset.latest_day()) else {
        return Vec::new();
    };
    let window = Window::new(end, i64::from(weeks.max(1)) * 7);

    let mut by_day: BTreeMap<NaiveDate, (f64, i64)> = BTreeMap::new();
    for row in &dataset.rows {
        let Some(day) = row.confirmed_day() else { continue };
        if !window.contains(day) {
            continue;
        }
        let slot = by_day.entry(day).or_default();
        slot.0 += row.premium_or_zero();
        slot.1 += row.units_or_zero();
    }

    by_day
        .into_iter()
        .map(|(date, (premium, policy_count))| TrendPoint {
            date,
            weekday: weekday_label(date).to_string(),
            premium,
            policy_count,
        })
        .collect()
}

/// Single-day totals plus the gap to the daily premium target.
pub fn daily_report(
    dataset: &Dataset,
    date: Option<NaiveDate>,
    daily_target: f64,
) -> Option<DailyReport> {
    let date = date.or_else(|| dataset.latest_day())?;
    let day = Window::new(date, 1).slice(dataset);
    let premium = premium_sum(&day);
    Some(DailyReport {
        date,
        premium,
        policy_count: unit_sum(&day),
        commission: commission_sum(&day),
        target_gap: premium - daily_target,
    })
}

pub(crate) fn weekday_label(date: NaiveDate) -> &'static str {
    WEEKDAY_LABELS[date.weekday().num_days_from_monday() as usize]
}
