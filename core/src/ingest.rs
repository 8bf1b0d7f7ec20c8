//! Spreadsheet ingestion and normalization.
//!
//! Each inbox file becomes a normalized batch: fully-empty rows dropped,
//! date and numeric columns coerced (invalid values become missing, never an
//! error), categorical blanks filled with the empty-string sentinel. One bad
//! file never aborts its siblings; failures are collected into the batch
//! report and the merge proceeds over the successes.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::column::ColumnId;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::record::{Dataset, PolicyRecord};
use crate::store::{merge, ConsolidatedStore};

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

const SPREADSHEET_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "csv"];

/// Outcome of one inbox scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Files merged and archived, in scan order.
    pub processed: Vec<String>,
    /// Files that failed to parse or archive; the merge went on without them.
    pub failed: Vec<IngestFailure>,
    /// Rows read from the successful files before deduplication.
    pub rows_ingested: usize,
    /// Rows in the store after the merge (0 when nothing was merged).
    pub store_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub file: String,
    pub reason: String,
}

/// A raw cell before coercion.
#[derive(Debug, Clone)]
enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Timestamp(NaiveDateTime),
}

static EMPTY_CELL: Cell = Cell::Empty;

/// Read and normalize a single extract. Dispatches on the file extension.
pub fn ingest_file(path: &Path) -> PipelineResult<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let (headers, rows) = match ext.as_str() {
        "csv" => read_csv_table(path)?,
        "xlsx" | "xls" => read_excel_table(path)?,
        _ => {
            return Err(PipelineError::UnsupportedFormat {
                path: path.display().to_string(),
            })
        }
    };
    let dataset = normalize(&headers, rows);
    log::info!(
        "ingested {}: {} rows, {} recognized columns",
        path.display(),
        dataset.rows.len(),
        dataset.columns.len()
    );
    Ok(dataset)
}

/// Scan the inbox, merge every readable extract into the store, then move
/// the ingested files into the processed archive. The store is saved before
/// any file is moved, so an archive failure never loses data.
pub fn ingest_and_merge(
    config: &PipelineConfig,
    store: &ConsolidatedStore,
) -> PipelineResult<IngestReport> {
    let mut report = IngestReport::default();

    if !config.inbox_dir.exists() {
        log::warn!("inbox {} does not exist", config.inbox_dir.display());
        return Ok(report);
    }

    let files = spreadsheet_files(&config.inbox_dir)?;
    if files.is_empty() {
        log::info!("no new extracts in {}", config.inbox_dir.display());
        return Ok(report);
    }

    let mut combined = Dataset::default();
    let mut succeeded: Vec<PathBuf> = Vec::new();
    for path in files {
        match ingest_file(&path) {
            Ok(batch) => {
                report.rows_ingested += batch.rows.len();
                combined.append(batch);
                succeeded.push(path);
            }
            Err(err) => {
                log::warn!("skipping {}: {err}", path.display());
                report.failed.push(IngestFailure {
                    file: path.display().to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    if succeeded.is_empty() {
        return Ok(report);
    }

    let existing = store.load()?.unwrap_or_default();
    let merged = merge(existing, combined);
    report.store_rows = merged.rows.len();
    store.save(&merged)?;

    fs::create_dir_all(&config.processed_dir)?;
    for path in succeeded {
        match archive_processed(&path, &config.processed_dir) {
            Ok(dest) => {
                log::info!("archived {} -> {}", path.display(), dest.display());
                report.processed.push(path.display().to_string());
            }
            Err(err) => {
                // The merge already happened; the file just stays in the
                // inbox and will be re-ingested (idempotent) next scan.
                log::warn!("could not archive {}: {err}", path.display());
                report.failed.push(IngestFailure {
                    file: path.display().to_string(),
                    reason: format!("archive failed: {err}"),
                });
            }
        }
    }

    Ok(report)
}

fn spreadsheet_files(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if ext.as_deref().is_some_and(|e| SPREADSHEET_EXTENSIONS.contains(&e)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn archive_processed(path: &Path, processed_dir: &Path) -> PipelineResult<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("extract");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("dat");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let dest = processed_dir.join(format!("{stem}_processed_{stamp}.{ext}"));
    fs::rename(path, &dest)?;
    Ok(dest)
}

// ── Reading ──────────────────────────────────────────────────────────────────

fn read_csv_table(path: &Path) -> PipelineResult<(Vec<Option<ColumnId>>, Vec<Vec<Cell>>)> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers: Vec<Option<ColumnId>> =
        reader.headers()?.iter().map(ColumnId::from_header).collect();
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let trimmed = field.trim();
                    if trimmed.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(trimmed.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok((headers, rows))
}

fn read_excel_table(path: &Path) -> PipelineResult<(Vec<Option<ColumnId>>, Vec<Vec<Cell>>)> {
    let mut workbook = open_workbook_auto(path)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => {
            return Err(anyhow::anyhow!("{} has no worksheets", path.display()).into());
        }
    };

    let mut iter = range.rows();
    let headers: Vec<Option<ColumnId>> = match iter.next() {
        Some(row) => row
            .iter()
            .map(|cell| ColumnId::from_header(&cell.to_string()))
            .collect(),
        None => Vec::new(),
    };
    let rows = iter
        .map(|row| row.iter().map(cell_from_excel).collect())
        .collect();
    Ok((headers, rows))
}

fn cell_from_excel(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(v) => Cell::Number(*v),
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(Cell::Timestamp)
            .unwrap_or(Cell::Empty),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Excel serial day 0 is 1899-12-30 in the 1900 date system.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = serial.floor();
    let secs = ((serial - days) * 86_400.0).round() as i64;
    let date = base.checked_add_signed(Duration::days(days as i64))?;
    date.and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::seconds(secs))
}

// ── Normalization ────────────────────────────────────────────────────────────

fn normalize(headers: &[Option<ColumnId>], raw_rows: Vec<Vec<Cell>>) -> Dataset {
    let columns: BTreeSet<ColumnId> = headers.iter().flatten().copied().collect();
    let mut rows = Vec::new();
    for raw in raw_rows {
        if raw.iter().all(is_blank) {
            continue;
        }
        let mut row = PolicyRecord::default();
        for (idx, column) in headers.iter().enumerate() {
            let Some(column) = column else { continue };
            let cell = raw.get(idx).unwrap_or(&EMPTY_CELL);
            assign(&mut row, *column, cell);
        }
        rows.push(row);
    }
    Dataset::new(columns, rows)
}

fn is_blank(cell: &Cell) -> bool {
    match cell {
        Cell::Empty => true,
        Cell::Text(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn assign(row: &mut PolicyRecord, column: ColumnId, cell: &Cell) {
    if column.is_date() {
        let ts = match cell {
            Cell::Timestamp(ts) => Some(*ts),
            Cell::Text(text) => parse_timestamp(text),
            Cell::Number(serial) => excel_serial_to_datetime(*serial),
            Cell::Empty => None,
        };
        if column == ColumnId::ConfirmedAt {
            row.confirmed_at = ts;
        }
        return;
    }

    if column.is_numeric() {
        let value = match cell {
            Cell::Number(v) => Some(*v),
            Cell::Text(text) => text.trim().replace(',', "").parse::<f64>().ok(),
            _ => None,
        };
        match column {
            ColumnId::Premium => row.premium = value,
            ColumnId::UnitCount => row.unit_count = value.map(|v| v.round() as i64),
            ColumnId::Commission => row.commission = value,
            _ => {}
        }
        return;
    }

    set_text(row, column, cell_text(cell));
}

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Text(text) => text.trim().to_string(),
        // Spreadsheets store ids as numbers; render integers without ".0".
        Cell::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
        Cell::Number(v) => v.to_string(),
        Cell::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
    }
}

fn set_text(row: &mut PolicyRecord, column: ColumnId, text: String) {
    match column {
        ColumnId::PolicyId => row.policy_id = text,
        ColumnId::AgentKey => row.agent_key = text,
        ColumnId::EndorsementType => row.endorsement_type = text,
        ColumnId::RenewalStatus => row.renewal_status = text,
        ColumnId::NewEnergy => row.new_energy = text,
        ColumnId::OwnershipTransfer => row.ownership_transfer = text,
        ColumnId::NonLocal => row.non_local = text,
        ColumnId::InsuranceLine => row.insurance_line = text,
        ColumnId::WeightBracket => row.weight_bracket = text,
        ColumnId::ChannelSource => row.channel_source = text,
        ColumnId::Combination => row.combination = text,
        ColumnId::BusinessClass => row.business_class = text,
        ColumnId::InsuranceCode => row.insurance_code = text,
        ColumnId::InsuranceName => row.insurance_name = text,
        ColumnId::Branch => row.branch = text,
        ColumnId::Team => row.team = text,
        ColumnId::ConfirmedAt | ColumnId::Premium | ColumnId::UnitCount
        | ColumnId::Commission => {}
    }
}

/// Lenient timestamp parser shared by ingestion and the store loader.
pub(crate) fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ts);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(day) = NaiveDate::parse_from_str(trimmed, format) {
            return day.and_hms_opt(0, 0, 0);
        }
    }
    None
}
