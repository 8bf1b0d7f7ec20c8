//! Pipeline configuration — where extracts arrive and where state lives.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;

/// Daily premium target used for the target-gap line of the reports.
pub const DEFAULT_DAILY_TARGET: f64 = 200_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory scanned for new spreadsheet extracts.
    pub inbox_dir: PathBuf,
    /// Where successfully ingested files are archived.
    pub processed_dir: PathBuf,
    /// The consolidated store file.
    pub store_path: PathBuf,
    /// The agent → organization mapping file.
    pub mapping_path: PathBuf,
    #[serde(default = "default_daily_target")]
    pub daily_premium_target: f64,
}

fn default_daily_target() -> f64 {
    DEFAULT_DAILY_TARGET
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inbox_dir: PathBuf::from("data"),
            processed_dir: PathBuf::from("data/processed"),
            store_path: PathBuf::from("consolidated_policies.csv"),
            mapping_path: PathBuf::from("agent_directory.json"),
            daily_premium_target: DEFAULT_DAILY_TARGET,
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Default layout rooted under `base`. Used by the CLI's `--data-root`
    /// flag and by tests that work in a temp directory.
    pub fn rooted_at(base: &Path) -> Self {
        Self {
            inbox_dir: base.join("data"),
            processed_dir: base.join("data/processed"),
            store_path: base.join("consolidated_policies.csv"),
            mapping_path: base.join("agent_directory.json"),
            daily_premium_target: DEFAULT_DAILY_TARGET,
        }
    }
}
