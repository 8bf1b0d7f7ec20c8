//! The transaction record and the in-memory dataset it lives in.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};

use crate::column::ColumnId;
use crate::types::{AgentKey, PolicyId};

/// One policy event (issuance or endorsement) from a source extract.
///
/// Categorical fields use the empty string as the missing-value sentinel.
/// Date and numeric fields stay `None` on coercion failure so sums and
/// window checks skip them instead of counting corrupted zeros.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyRecord {
    pub policy_id: PolicyId,
    pub confirmed_at: Option<NaiveDateTime>,
    pub premium: Option<f64>,
    pub unit_count: Option<i64>,
    pub commission: Option<f64>,
    pub agent_key: AgentKey,
    pub endorsement_type: String,
    pub renewal_status: String,
    pub new_energy: String,
    pub ownership_transfer: String,
    pub non_local: String,
    pub insurance_line: String,
    pub weight_bracket: String,
    pub channel_source: String,
    pub combination: String,
    pub business_class: String,
    pub insurance_code: String,
    pub insurance_name: String,
    pub branch: String,
    pub team: String,
}

impl PolicyRecord {
    /// Day-granularity confirmation date. Every window comparison goes
    /// through this so sub-day timestamp noise cannot shift a boundary.
    pub fn confirmed_day(&self) -> Option<NaiveDate> {
        self.confirmed_at.map(|ts| ts.date())
    }

    pub fn premium_or_zero(&self) -> f64 {
        self.premium.unwrap_or(0.0)
    }

    pub fn units_or_zero(&self) -> i64 {
        self.unit_count.unwrap_or(0)
    }

    pub fn commission_or_zero(&self) -> f64 {
        self.commission.unwrap_or(0.0)
    }

    /// Whether this row is an original record (no endorsement applied).
    pub fn is_original(&self) -> bool {
        self.endorsement_type.is_empty()
    }

    /// Textual value of a categorical column. Date and numeric columns have
    /// no text form and read as empty.
    pub fn text(&self, column: ColumnId) -> &str {
        match column {
            ColumnId::PolicyId => &self.policy_id,
            ColumnId::AgentKey => &self.agent_key,
            ColumnId::EndorsementType => &self.endorsement_type,
            ColumnId::RenewalStatus => &self.renewal_status,
            ColumnId::NewEnergy => &self.new_energy,
            ColumnId::OwnershipTransfer => &self.ownership_transfer,
            ColumnId::NonLocal => &self.non_local,
            ColumnId::InsuranceLine => &self.insurance_line,
            ColumnId::WeightBracket => &self.weight_bracket,
            ColumnId::ChannelSource => &self.channel_source,
            ColumnId::Combination => &self.combination,
            ColumnId::BusinessClass => &self.business_class,
            ColumnId::InsuranceCode => &self.insurance_code,
            ColumnId::InsuranceName => &self.insurance_name,
            ColumnId::Branch => &self.branch,
            ColumnId::Team => &self.team,
            ColumnId::ConfirmedAt | ColumnId::Premium | ColumnId::UnitCount
            | ColumnId::Commission => "",
        }
    }
}

/// The consolidated table: rows plus the set of columns any ingested batch
/// actually carried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: BTreeSet<ColumnId>,
    pub rows: Vec<PolicyRecord>,
}

impl Dataset {
    pub fn new(columns: BTreeSet<ColumnId>, rows: Vec<PolicyRecord>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: ColumnId) -> bool {
        self.columns.contains(&column)
    }

    /// Latest confirmation date present, if any. The default query anchor.
    pub fn latest_day(&self) -> Option<NaiveDate> {
        self.rows.iter().filter_map(PolicyRecord::confirmed_day).max()
    }

    /// Rows satisfying `keep`, with the column set preserved.
    pub fn select<F>(&self, keep: F) -> Dataset
    where
        F: Fn(&PolicyRecord) -> bool,
    {
        Dataset {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Concatenate `other` after this dataset, taking the union of columns.
    pub fn append(&mut self, other: Dataset) {
        self.columns.extend(other.columns);
        self.rows.extend(other.rows);
    }
}
