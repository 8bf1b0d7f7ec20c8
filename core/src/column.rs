//! Column identities of the consolidated policy table.
//!
//! Extracts drift: a batch may carry any subset of these columns. Every
//! dataset records which columns it actually saw, and predicates or
//! aggregates over an absent column degrade to "no rows" / zero instead of
//! failing. Only this module knows the wire headers.

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ColumnId {
    PolicyId,
    ConfirmedAt,
    Premium,
    UnitCount,
    Commission,
    AgentKey,
    EndorsementType,
    RenewalStatus,
    NewEnergy,
    OwnershipTransfer,
    NonLocal,
    InsuranceLine,
    WeightBracket,
    ChannelSource,
    Combination,
    BusinessClass,
    InsuranceCode,
    InsuranceName,
    Branch,
    Team,
}

impl ColumnId {
    pub const ALL: [ColumnId; 20] = [
        ColumnId::PolicyId,
        ColumnId::ConfirmedAt,
        ColumnId::Premium,
        ColumnId::UnitCount,
        ColumnId::Commission,
        ColumnId::AgentKey,
        ColumnId::EndorsementType,
        ColumnId::RenewalStatus,
        ColumnId::NewEnergy,
        ColumnId::OwnershipTransfer,
        ColumnId::NonLocal,
        ColumnId::InsuranceLine,
        ColumnId::WeightBracket,
        ColumnId::ChannelSource,
        ColumnId::Combination,
        ColumnId::BusinessClass,
        ColumnId::InsuranceCode,
        ColumnId::InsuranceName,
        ColumnId::Branch,
        ColumnId::Team,
    ];

    /// Canonical header, as written to the consolidated CSV.
    pub fn header(self) -> &'static str {
        match self {
            ColumnId::PolicyId => "policy_id",
            ColumnId::ConfirmedAt => "confirmed_at",
            ColumnId::Premium => "premium",
            ColumnId::UnitCount => "unit_count",
            ColumnId::Commission => "commission",
            ColumnId::AgentKey => "agent",
            ColumnId::EndorsementType => "endorsement_type",
            ColumnId::RenewalStatus => "renewal_status",
            ColumnId::NewEnergy => "new_energy",
            ColumnId::OwnershipTransfer => "ownership_transfer",
            ColumnId::NonLocal => "non_local",
            ColumnId::InsuranceLine => "insurance_line",
            ColumnId::WeightBracket => "weight_bracket",
            ColumnId::ChannelSource => "channel_source",
            ColumnId::Combination => "combination",
            ColumnId::BusinessClass => "business_class",
            ColumnId::InsuranceCode => "insurance_code",
            ColumnId::InsuranceName => "insurance_name",
            ColumnId::Branch => "branch",
            ColumnId::Team => "team",
        }
    }

    /// Parse a source header. Unknown headers map to `None` and are dropped
    /// during ingestion.
    pub fn from_header(header: &str) -> Option<ColumnId> {
        let trimmed = header.trim();
        ColumnId::ALL.iter().copied().find(|c| c.header() == trimmed)
    }

    /// Columns coerced to date-time during normalization.
    pub fn is_date(self) -> bool {
        matches!(self, ColumnId::ConfirmedAt)
    }

    /// Columns coerced to numbers during normalization.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ColumnId::Premium | ColumnId::UnitCount | ColumnId::Commission
        )
    }
}
