//! The reporting engine — the public face of the core.
//!
//! One engine is built per process. The agent directory loads once at
//! construction and is read-only afterwards; every query operation reloads
//! the consolidated store from disk, so a request always works on a
//! complete, immutable-for-the-request snapshot (saves are atomic renames).
//!
//! Every query returns `Ok(None)` (or an empty collection) when the store
//! does not exist yet or when no anchor date can be determined; callers
//! render that "no data" signal distinctly from populated-but-zero results.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::{
    self, ComparisonMetric, DailyReport, KpiWindows, TrendPoint, WeekComparison,
};
use crate::column::ColumnId;
use crate::config::PipelineConfig;
use crate::distribution::{self, DistributionKind, DistributionReport, Period};
use crate::error::PipelineResult;
use crate::filter::{DataScope, FilterSpec};
use crate::ingest::{self, IngestReport};
use crate::mapping::{resolve_identity, AgentDirectory, OrgAssignment};
use crate::record::Dataset;
use crate::store::ConsolidatedStore;
use crate::validate::{self, ValidationReport};

pub struct ReportEngine {
    config: PipelineConfig,
    directory: AgentDirectory,
    store: ConsolidatedStore,
}

/// Selectable values for every filter dimension, for UI pickers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterOptions {
    pub branches: Vec<String>,
    pub teams: Vec<String>,
    pub branch_teams: BTreeMap<String, Vec<String>>,
    pub renewal_status: Vec<String>,
    pub new_energy: Vec<String>,
    pub ownership_transfer: Vec<String>,
    pub non_local: Vec<String>,
    pub insurance_lines: Vec<String>,
    pub weight_brackets: Vec<String>,
    pub business_classes: Vec<String>,
    pub policy_ids: Vec<String>,
    pub agents: Vec<String>,
}

/// Policy → agent → organization view, with the ambiguity list attached so
/// callers can warn about names that resolve to several entries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PolicyMappingView {
    /// Policy id → agent name. First occurrence wins.
    pub policy_to_agent: BTreeMap<String, String>,
    pub agent_info: BTreeMap<String, OrgAssignment>,
    pub conflicts: Vec<String>,
}

impl ReportEngine {
    pub fn open(config: PipelineConfig) -> PipelineResult<Self> {
        let directory = AgentDirectory::load(&config.mapping_path)?;
        if directory.is_empty() {
            log::warn!(
                "agent directory {} is empty; organization filters will match nothing",
                config.mapping_path.display()
            );
        }
        let store = ConsolidatedStore::new(config.store_path.clone());
        Ok(Self {
            config,
            directory,
            store,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    fn snapshot(&self) -> PipelineResult<Option<Dataset>> {
        self.store.load()
    }

    /// Scan the inbox, merge new extracts into the store, archive the files.
    pub fn refresh_data(&self) -> PipelineResult<IngestReport> {
        ingest::ingest_and_merge(&self.config, &self.store)
    }

    pub fn daily_report(&self, date: Option<NaiveDate>) -> PipelineResult<Option<DailyReport>> {
        let Some(dataset) = self.snapshot()? else {
            return Ok(None);
        };
        Ok(aggregate::daily_report(
            &dataset,
            date,
            self.config.daily_premium_target,
        ))
    }

    pub fn week_trend(
        &self,
        end: Option<NaiveDate>,
        weeks: u32,
    ) -> PipelineResult<Vec<TrendPoint>> {
        let Some(dataset) = self.snapshot()? else {
            return Ok(Vec::new());
        };
        Ok(aggregate::week_trend(&dataset, end, weeks))
    }

    pub fn kpi_windows(
        &self,
        date: Option<NaiveDate>,
        spec: &FilterSpec,
        scope: DataScope,
    ) -> PipelineResult<Option<KpiWindows>> {
        let Some(dataset) = self.snapshot()? else {
            return Ok(None);
        };
        Ok(aggregate::kpi_windows(
            &dataset,
            date,
            spec,
            scope,
            &self.directory,
            self.config.daily_premium_target,
        ))
    }

    pub fn week_comparison(
        &self,
        metric: ComparisonMetric,
        spec: &FilterSpec,
        anchor: Option<NaiveDate>,
        scope: DataScope,
    ) -> PipelineResult<Option<WeekComparison>> {
        let Some(dataset) = self.snapshot()? else {
            return Ok(None);
        };
        Ok(aggregate::week_comparison(
            &dataset,
            metric,
            spec,
            anchor,
            scope,
            &self.directory,
        ))
    }

    pub fn distribution(
        &self,
        kind: DistributionKind,
        period: Period,
        date: Option<NaiveDate>,
        spec: &FilterSpec,
        scope: DataScope,
    ) -> PipelineResult<Option<DistributionReport>> {
        let Some(dataset) = self.snapshot()? else {
            return Ok(None);
        };
        Ok(distribution::distribution(
            &dataset,
            kind,
            period,
            date,
            spec,
            scope,
            &self.directory,
        ))
    }

    /// Latest confirmation date in the store.
    pub fn latest_date(&self) -> PipelineResult<Option<NaiveDate>> {
        Ok(self.snapshot()?.and_then(|dataset| dataset.latest_day()))
    }

    /// Catalog of selectable filter values, built from the directory and the
    /// distinct values present in the store.
    pub fn filter_options(&self) -> PipelineResult<FilterOptions> {
        let mut options = FilterOptions {
            branches: self.directory.branches(),
            teams: self.directory.teams(),
            branch_teams: self.directory.branch_team_map(),
            ..FilterOptions::default()
        };

        if let Some(dataset) = self.snapshot()? {
            options.renewal_status = distinct(&dataset, ColumnId::RenewalStatus);
            options.new_energy = distinct(&dataset, ColumnId::NewEnergy);
            options.ownership_transfer = distinct(&dataset, ColumnId::OwnershipTransfer);
            options.non_local = distinct(&dataset, ColumnId::NonLocal);
            options.insurance_lines = distinct(&dataset, ColumnId::InsuranceLine);
            options.weight_brackets = distinct(&dataset, ColumnId::WeightBracket);
            options.business_classes = distinct(&dataset, ColumnId::BusinessClass);
            options.policy_ids = distinct(&dataset, ColumnId::PolicyId);
            options.agents = distinct(&dataset, ColumnId::AgentKey);
        }

        Ok(options)
    }

    /// Policy id → agent name map plus the name → organization view.
    pub fn policy_mapping(&self) -> PipelineResult<PolicyMappingView> {
        let (index, conflicts) = self.directory.name_index();
        let mut view = PolicyMappingView {
            agent_info: index.into_iter().collect(),
            conflicts,
            ..PolicyMappingView::default()
        };

        let Some(dataset) = self.snapshot()? else {
            return Ok(view);
        };
        if !dataset.has_column(ColumnId::PolicyId) || !dataset.has_column(ColumnId::AgentKey) {
            return Ok(view);
        }

        for row in &dataset.rows {
            if row.policy_id.is_empty() || row.agent_key.is_empty() {
                continue;
            }
            let name = resolve_identity(&row.agent_key).name;
            let agent = if name.is_empty() {
                row.agent_key.clone()
            } else {
                name
            };
            view.policy_to_agent
                .entry(row.policy_id.clone())
                .or_insert(agent);
        }
        Ok(view)
    }

    /// Unmatched agents, policy inconsistencies and the concentration check
    /// in one advisory report. `None` when the store does not exist yet.
    pub fn validation_report(&self) -> PipelineResult<Option<ValidationReport>> {
        let Some(dataset) = self.snapshot()? else {
            return Ok(None);
        };
        Ok(Some(validate::full_report(&dataset, &self.directory)))
    }
}

fn distinct(dataset: &Dataset, column: ColumnId) -> Vec<String> {
    if !dataset.has_column(column) {
        return Vec::new();
    }
    let mut values: Vec<&str> = dataset
        .rows
        .iter()
        .map(|row| row.text(column))
        .filter(|value| !value.is_empty())
        .collect();
    values.sort_unstable();
    values.dedup();
    values.into_iter().map(str::to_string).collect()
}
