//! Advisory cross-checks between transactional data and the directory.
//!
//! Everything here annotates query results; nothing blocks or alters them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::column::ColumnId;
use crate::mapping::{resolve_identity, AgentDirectory};
use crate::record::Dataset;

/// Branch share-of-rows above which concentration is flagged.
pub const CONCENTRATION_THRESHOLD: f64 = 0.40;
/// Share above which a concentration alert escalates to high severity.
const CONCENTRATION_HIGH: f64 = 0.50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub unmatched_agents: Vec<String>,
    pub unmatched_count: usize,
    pub mismatch_policies: Vec<String>,
    pub mismatch_count: usize,
    /// Names resolving to multiple disagreeing directory entries.
    pub ambiguous_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationAlert {
    pub branch: String,
    /// Share of total rows, as a 1-decimal percentage.
    pub share_pct: f64,
    pub severity: Severity,
}

/// The full advisory report returned by the engine's validation operation.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    #[serde(flatten)]
    pub summary: ValidationSummary,
    pub concentration: Option<ConcentrationAlert>,
}

pub fn summary(dataset: &Dataset, directory: &AgentDirectory) -> ValidationSummary {
    let unmatched = unmatched_agents(dataset, directory);
    let mismatches = policy_consistency(dataset, directory);
    let (_, conflicts) = directory.name_index();
    ValidationSummary {
        unmatched_count: unmatched.len(),
        unmatched_agents: unmatched,
        mismatch_count: mismatches.len(),
        mismatch_policies: mismatches,
        ambiguous_names: conflicts,
    }
}

pub fn full_report(dataset: &Dataset, directory: &AgentDirectory) -> ValidationReport {
    ValidationReport {
        summary: summary(dataset, directory),
        concentration: organization_concentration(dataset),
    }
}

/// Agent names present in the data but absent from the directory's name
/// view. Sorted; empty when either side is empty.
pub fn unmatched_agents(dataset: &Dataset, directory: &AgentDirectory) -> Vec<String> {
    if dataset.is_empty() || directory.is_empty() || !dataset.has_column(ColumnId::AgentKey) {
        return Vec::new();
    }
    let (index, _) = directory.name_index();
    let mut unmatched: BTreeSet<String> = BTreeSet::new();
    for row in &dataset.rows {
        if row.agent_key.is_empty() {
            continue;
        }
        let name = resolve_identity(&row.agent_key).name;
        if name.is_empty() || index.contains_key(&name) {
            continue;
        }
        unmatched.insert(name);
    }
    if !unmatched.is_empty() {
        log::warn!("{} agents in data have no directory entry", unmatched.len());
    }
    unmatched.into_iter().collect()
}

/// Policy ids whose embedded branch/team contradict the directory's view of
/// that row's agent. Rows with unmapped agents are skipped;
/// `unmatched_agents` owns those.
pub fn policy_consistency(dataset: &Dataset, directory: &AgentDirectory) -> Vec<String> {
    if dataset.is_empty()
        || !dataset.has_column(ColumnId::PolicyId)
        || !dataset.has_column(ColumnId::AgentKey)
    {
        return Vec::new();
    }
    let has_branch = dataset.has_column(ColumnId::Branch);
    let has_team = dataset.has_column(ColumnId::Team);
    if !has_branch && !has_team {
        return Vec::new();
    }

    let (index, _) = directory.name_index();
    let mut mismatches: BTreeSet<String> = BTreeSet::new();
    for row in &dataset.rows {
        let name = resolve_identity(&row.agent_key).name;
        let Some(info) = index.get(&name) else { continue };
        let branch_off = has_branch && !row.branch.is_empty() && row.branch != info.branch;
        let team_off = has_team
            && !row.team.is_empty()
            && Some(row.team.as_str()) != info.team.as_deref();
        if branch_off || team_off {
            mismatches.insert(row.policy_id.clone());
        }
    }
    mismatches.into_iter().collect()
}

/// Flag the branch holding more than `CONCENTRATION_THRESHOLD` of the rows.
pub fn organization_concentration(dataset: &Dataset) -> Option<ConcentrationAlert> {
    if dataset.is_empty() || !dataset.has_column(ColumnId::Branch) {
        return None;
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for row in &dataset.rows {
        if row.branch.is_empty() {
            continue;
        }
        *counts.entry(row.branch.as_str()).or_default() += 1;
    }
    let total: usize = counts.values().sum();
    if total == 0 {
        return None;
    }

    let (branch, count) = counts.into_iter().max_by_key(|(_, count)| *count)?;
    let share = count as f64 / total as f64;
    if share <= CONCENTRATION_THRESHOLD {
        return None;
    }
    let severity = if share > CONCENTRATION_HIGH {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(ConcentrationAlert {
        branch: branch.to_string(),
        share_pct: (share * 1000.0).round() / 10.0,
        severity,
    })
}
