//! The consolidated policy store — one CSV file, rewritten wholesale.
//!
//! RULE: only store.rs touches the file. Queries take a fresh in-memory
//! copy via `load`; the ingest path is the single writer. Saves go through
//! a temp file and an atomic rename so a concurrent reader never observes a
//! partially written store.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::column::ColumnId;
use crate::error::PipelineResult;
use crate::ingest::{parse_timestamp, TIMESTAMP_FORMAT};
use crate::record::{Dataset, PolicyRecord};

pub struct ConsolidatedStore {
    path: PathBuf,
}

impl ConsolidatedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the full store. `None` means no ingestion has happened yet;
    /// callers translate that into their "no data" result.
    pub fn load(&self) -> PipelineResult<Option<Dataset>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let headers: Vec<Option<ColumnId>> =
            reader.headers()?.iter().map(ColumnId::from_header).collect();
        let columns: BTreeSet<ColumnId> = headers.iter().flatten().copied().collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row = PolicyRecord::default();
            for (idx, column) in headers.iter().enumerate() {
                let Some(column) = column else { continue };
                if let Some(value) = record.get(idx) {
                    set_field(&mut row, *column, value);
                }
            }
            rows.push(row);
        }
        Ok(Some(Dataset::new(columns, rows)))
    }

    /// Persist the full store: write a temp file next to the target, then
    /// rename over it.
    pub fn save(&self, dataset: &Dataset) -> PipelineResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            let columns: Vec<ColumnId> = dataset.columns.iter().copied().collect();
            writer.write_record(columns.iter().map(|c| c.header()))?;
            for row in &dataset.rows {
                writer.write_record(columns.iter().map(|c| field_text(row, *c)))?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        log::info!(
            "store saved: {} rows -> {}",
            dataset.rows.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Merge a newly ingested batch into the existing store contents.
///
/// Incoming rows are appended after existing ones, so keep-last
/// deduplication makes a re-ingested correction override the earlier row.
/// When either key column is missing the concatenation is returned as-is;
/// that is config-mistake territory worth a warning, not a hard failure.
pub fn merge(existing: Dataset, incoming: Dataset) -> Dataset {
    let mut combined = existing;
    combined.append(incoming);

    if !combined.has_column(ColumnId::PolicyId) || !combined.has_column(ColumnId::ConfirmedAt) {
        log::warn!("merge kept duplicates: policy_id or confirmed_at column missing");
        return combined;
    }

    let Dataset { columns, rows } = combined;

    let mut last_index: HashMap<(String, Option<NaiveDateTime>), usize> = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        last_index.insert((row.policy_id.clone(), row.confirmed_at), idx);
    }
    let deduped: Vec<PolicyRecord> = rows
        .into_iter()
        .enumerate()
        .filter(|(idx, row)| {
            last_index
                .get(&(row.policy_id.clone(), row.confirmed_at))
                .copied()
                == Some(*idx)
        })
        .map(|(_, row)| row)
        .collect();

    Dataset::new(columns, deduped)
}

fn set_field(row: &mut PolicyRecord, column: ColumnId, value: &str) {
    let value = value.trim();
    match column {
        ColumnId::ConfirmedAt => row.confirmed_at = parse_timestamp(value),
        ColumnId::Premium => row.premium = value.parse().ok(),
        ColumnId::UnitCount => {
            row.unit_count = value.parse::<f64>().ok().map(|v| v.round() as i64)
        }
        ColumnId::Commission => row.commission = value.parse().ok(),
        ColumnId::PolicyId => row.policy_id = value.to_string(),
        ColumnId::AgentKey => row.agent_key = value.to_string(),
        ColumnId::EndorsementType => row.endorsement_type = value.to_string(),
        ColumnId::RenewalStatus => row.renewal_status = value.to_string(),
        ColumnId::NewEnergy => row.new_energy = value.to_string(),
        ColumnId::OwnershipTransfer => row.ownership_transfer = value.to_string(),
        ColumnId::NonLocal => row.non_local = value.to_string(),
        ColumnId::InsuranceLine => row.insurance_line = value.to_string(),
        ColumnId::WeightBracket => row.weight_bracket = value.to_string(),
        ColumnId::ChannelSource => row.channel_source = value.to_string(),
        ColumnId::Combination => row.combination = value.to_string(),
        ColumnId::BusinessClass => row.business_class = value.to_string(),
        ColumnId::InsuranceCode => row.insurance_code = value.to_string(),
        ColumnId::InsuranceName => row.insurance_name = value.to_string(),
        ColumnId::Branch => row.branch = value.to_string(),
        ColumnId::Team => row.team = value.to_string(),
    }
}

fn field_text(row: &PolicyRecord, column: ColumnId) -> String {
    match column {
        ColumnId::ConfirmedAt => row
            .confirmed_at
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default(),
        ColumnId::Premium => row.premium.map(|v| v.to_string()).unwrap_or_default(),
        ColumnId::UnitCount => row.unit_count.map(|v| v.to_string()).unwrap_or_default(),
        ColumnId::Commission => row.commission.map(|v| v.to_string()).unwrap_or_default(),
        _ => row.text(column).to_string(),
    }
}
