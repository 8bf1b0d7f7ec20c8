//! Declarative row filtering.
//!
//! Each recognized key applies an independent predicate; predicates
//! intersect. Organization and team resolve indirectly through the agent
//! directory, and the agent key accepts either a bare name or the full
//! composite key. Unrecognized or malformed values apply no constraint.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::column::ColumnId;
use crate::mapping::{resolve_identity, AgentDirectory};
use crate::record::Dataset;
use crate::vocab;

/// Sentinel a UI sends to mean "no constraint".
const ALL: &str = "all";

/// Whether endorsement/correction rows participate in a computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataScope {
    #[default]
    ExcludeCorrections,
    IncludeCorrections,
}

impl DataScope {
    pub fn parse(text: &str) -> Option<DataScope> {
        match text {
            "exclude_corrections" | "exclude" => Some(DataScope::ExcludeCorrections),
            "include_corrections" | "include" => Some(DataScope::IncludeCorrections),
            _ => None,
        }
    }
}

/// Request-scoped filter selection. `None` (or the literal "all") leaves the
/// corresponding dimension unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub policy_id: Option<String>,
    pub agent: Option<String>,
    pub branch: Option<String>,
    pub team: Option<String>,
    pub renewal_status: Option<String>,
    pub new_energy: Option<String>,
    pub ownership_transfer: Option<String>,
    pub non_local: Option<String>,
    pub insurance_line: Option<String>,
    pub weight_bracket: Option<String>,
    pub telesales: Option<String>,
    pub business_class: Option<String>,
}

impl FilterSpec {
    /// The effective constraint behind an optional field, if any.
    fn constraint(value: &Option<String>) -> Option<&str> {
        match value.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(v) if v.eq_ignore_ascii_case(ALL) => None,
            Some(v) => Some(v),
        }
    }
}

/// Restrict to the requested data scope. This runs before `apply` in every
/// query path so numerators and denominators agree.
pub fn apply_scope(dataset: &Dataset, scope: DataScope) -> Dataset {
    match scope {
        DataScope::IncludeCorrections => dataset.clone(),
        DataScope::ExcludeCorrections => {
            if !dataset.has_column(ColumnId::EndorsementType) {
                // Without an endorsement column every row is an original.
                return dataset.clone();
            }
            dataset.select(|row| row.is_original())
        }
    }
}

/// Apply `spec` to `dataset`. Predicates are AND-composed.
pub fn apply(dataset: &Dataset, spec: &FilterSpec, directory: &AgentDirectory) -> Dataset {
    let mut subset = dataset.clone();

    // Branch/team start from the request but can be overridden below.
    let mut branch = FilterSpec::constraint(&spec.branch).map(str::to_string);
    let mut team = FilterSpec::constraint(&spec.team).map(str::to_string);

    if let Some(policy_id) = FilterSpec::constraint(&spec.policy_id) {
        subset = subset.select(|row| row.policy_id == policy_id);

        // The mapping entry for this policy's agent wins over any
        // user-supplied organization or team.
        if let Some(first) = subset.rows.first() {
            let name = resolve_identity(&first.agent_key).name;
            let (index, _) = directory.name_index();
            if let Some(info) = index.get(&name) {
                if branch.is_some() && branch.as_deref() != Some(info.branch.as_str()) {
                    log::info!(
                        "policy {policy_id}: branch filter overridden to {}",
                        info.branch
                    );
                    branch = Some(info.branch.clone());
                }
                if team.is_some() && team.as_deref() != info.team.as_deref() {
                    log::info!("policy {policy_id}: team filter overridden by mapping");
                    team = info.team.clone();
                }
            }
        }
    }

    if let Some(agent) = FilterSpec::constraint(&spec.agent) {
        subset = filter_by_agent(&subset, agent, directory);
    }

    if let Some(branch) = branch.as_deref() {
        let keys: HashSet<&str> = directory.keys_with_branch(branch).into_iter().collect();
        // No agents under that branch means an empty result, not "unfiltered".
        subset = subset.select(|row| keys.contains(row.agent_key.as_str()));
    }

    if let Some(team) = team.as_deref() {
        let keys: HashSet<&str> = directory.keys_with_team(team).into_iter().collect();
        subset = subset.select(|row| keys.contains(row.agent_key.as_str()));
    }

    if let Some(value) = FilterSpec::constraint(&spec.renewal_status) {
        if subset.has_column(ColumnId::RenewalStatus) {
            subset = subset.select(|row| row.renewal_status == value);
        } else if subset.has_column(ColumnId::BusinessClass) {
            // Older extracts carried only the business classification.
            subset = subset.select(|row| row.business_class == value);
        } else {
            log::warn!("ignoring renewal filter: no backing column in store");
        }
    }

    subset = equality_filter(subset, ColumnId::NewEnergy, &spec.new_energy);
    subset = equality_filter(subset, ColumnId::OwnershipTransfer, &spec.ownership_transfer);
    subset = equality_filter(subset, ColumnId::NonLocal, &spec.non_local);
    subset = equality_filter(subset, ColumnId::InsuranceLine, &spec.insurance_line);
    subset = equality_filter(subset, ColumnId::WeightBracket, &spec.weight_bracket);
    subset = equality_filter(subset, ColumnId::BusinessClass, &spec.business_class);

    if let Some(value) = FilterSpec::constraint(&spec.telesales) {
        if subset.has_column(ColumnId::ChannelSource) {
            match value {
                v if v == vocab::YES => {
                    subset =
                        subset.select(|row| row.channel_source == vocab::TELESALES_CHANNEL);
                }
                v if v == vocab::NO => {
                    subset =
                        subset.select(|row| row.channel_source != vocab::TELESALES_CHANNEL);
                }
                other => log::warn!("ignoring telesales filter value {other:?}"),
            }
        }
    }

    subset
}

/// Agent filter: a value containing a digit is a full composite key and
/// matches exactly; a bare name resolves through the directory (matching all
/// composite keys that share the name), falling back to name extraction on
/// the data itself for agents the directory does not know.
fn filter_by_agent(dataset: &Dataset, requested: &str, directory: &AgentDirectory) -> Dataset {
    if requested.chars().any(|c| c.is_ascii_digit()) {
        return dataset.select(|row| row.agent_key == requested);
    }

    let keys: HashSet<&str> = directory.keys_with_name(requested).into_iter().collect();
    if !keys.is_empty() {
        dataset.select(|row| keys.contains(row.agent_key.as_str()))
    } else {
        dataset.select(|row| resolve_identity(&row.agent_key).name == requested)
    }
}

fn equality_filter(dataset: Dataset, column: ColumnId, requested: &Option<String>) -> Dataset {
    let Some(value) = FilterSpec::constraint(requested) else {
        return dataset;
    };
    if !dataset.has_column(column) {
        log::warn!("ignoring {} filter: column absent from store", column.header());
        return dataset;
    }
    dataset.select(|row| row.text(column) == value)
}
