//! report-runner: headless reporting runner for the auto-policy pipeline.
//!
//! Usage:
//!   report-runner --data-root ./deploy ingest
//!   report-runner daily --date 2025-11-05
//!   report-runner kpi --branch Chengdu --scope exclude
//!   report-runner weekly --metric count
//!   report-runner dist --kind staff_performance --period last7d
//!   report-runner trend --weeks 3
//!   report-runner options | validate | latest

use anyhow::Result;
use autopolicy_core::aggregate::ComparisonMetric;
use autopolicy_core::config::PipelineConfig;
use autopolicy_core::distribution::{DistributionKind, Period};
use autopolicy_core::filter::{DataScope, FilterSpec};
use autopolicy_core::ReportEngine;
use chrono::NaiveDate;
use std::env;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let config = match flag_value(&args, "--config") {
        Some(path) => PipelineConfig::from_file(Path::new(&path))?,
        None => match flag_value(&args, "--data-root") {
            Some(root) => PipelineConfig::rooted_at(&PathBuf::from(root)),
            None => PipelineConfig::default(),
        },
    };

    let command = args
        .iter()
        .skip(1)
        .find(|a| !a.starts_with("--") && !is_flag_operand(&args, a))
        .map(String::as_str)
        .unwrap_or("kpi");

    let engine = ReportEngine::open(config)?;

    match command {
        "ingest" => run_ingest(&engine)?,
        "daily" => run_daily(&engine, &args)?,
        "trend" => run_trend(&engine, &args)?,
        "kpi" => run_kpi(&engine, &args)?,
        "weekly" => run_weekly(&engine, &args)?,
        "dist" => run_distribution(&engine, &args)?,
        "options" => print_json(&engine.filter_options()?)?,
        "mapping" => print_json(&engine.policy_mapping()?)?,
        "validate" => match engine.validation_report()? {
            Some(report) => print_json(&report)?,
            None => println!("no data"),
        },
        "latest" => match engine.latest_date()? {
            Some(date) => println!("{date}"),
            None => println!("no data"),
        },
        other => {
            log::warn!("unknown command: {other}");
            println!("commands: ingest daily trend kpi weekly dist options mapping validate latest");
        }
    }

    Ok(())
}

fn run_ingest(engine: &ReportEngine) -> Result<()> {
    let report = engine.refresh_data()?;
    println!("=== INGEST SUMMARY ===");
    println!("  files processed: {}", report.processed.len());
    println!("  files failed:    {}", report.failed.len());
    println!("  rows ingested:   {}", report.rows_ingested);
    println!("  store rows:      {}", report.store_rows);
    for failure in &report.failed {
        println!("  FAILED {} ({})", failure.file, failure.reason);
    }
    Ok(())
}

fn run_daily(engine: &ReportEngine, args: &[String]) -> Result<()> {
    match engine.daily_report(parse_date(args, "--date"))? {
        Some(report) => print_json(&report)?,
        None => println!("no data"),
    }
    Ok(())
}

fn run_trend(engine: &ReportEngine, args: &[String]) -> Result<()> {
    let weeks = parse_arg(args, "--weeks", 1u32);
    let trend = engine.week_trend(parse_date(args, "--date"), weeks)?;
    if trend.is_empty() {
        println!("no data");
    } else {
        print_json(&trend)?;
    }
    Ok(())
}

fn run_kpi(engine: &ReportEngine, args: &[String]) -> Result<()> {
    let spec = filter_spec(args);
    match engine.kpi_windows(parse_date(args, "--date"), &spec, parse_scope(args))? {
        Some(report) => print_json(&report)?,
        None => println!("no data"),
    }
    Ok(())
}

fn run_weekly(engine: &ReportEngine, args: &[String]) -> Result<()> {
    let metric = flag_value(args, "--metric")
        .as_deref()
        .and_then(ComparisonMetric::parse)
        .unwrap_or(ComparisonMetric::Premium);
    let spec = filter_spec(args);
    match engine.week_comparison(metric, &spec, parse_date(args, "--date"), parse_scope(args))? {
        Some(report) => print_json(&report)?,
        None => println!("no data"),
    }
    Ok(())
}

fn run_distribution(engine: &ReportEngine, args: &[String]) -> Result<()> {
    let kind = flag_value(args, "--kind")
        .as_deref()
        .and_then(DistributionKind::parse)
        .unwrap_or(DistributionKind::StaffPerformance);
    let period = flag_value(args, "--period")
        .as_deref()
        .and_then(Period::parse)
        .unwrap_or(Period::Day);
    let spec = filter_spec(args);
    match engine.distribution(kind, period, parse_date(args, "--date"), &spec, parse_scope(args))? {
        Some(report) => print_json(&report)?,
        None => println!("no data"),
    }
    Ok(())
}

fn filter_spec(args: &[String]) -> FilterSpec {
    FilterSpec {
        policy_id: flag_value(args, "--policy"),
        agent: flag_value(args, "--agent"),
        branch: flag_value(args, "--branch"),
        team: flag_value(args, "--team"),
        renewal_status: flag_value(args, "--renewal"),
        new_energy: flag_value(args, "--new-energy"),
        ownership_transfer: flag_value(args, "--transfer"),
        non_local: flag_value(args, "--non-local"),
        insurance_line: flag_value(args, "--line"),
        weight_bracket: flag_value(args, "--weight"),
        telesales: flag_value(args, "--telesales"),
        business_class: flag_value(args, "--business"),
    }
}

fn parse_scope(args: &[String]) -> DataScope {
    flag_value(args, "--scope")
        .as_deref()
        .and_then(DataScope::parse)
        .unwrap_or_default()
}

fn parse_date(args: &[String], flag: &str) -> Option<NaiveDate> {
    flag_value(args, flag).and_then(|value| value.parse().ok())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
}

/// Whether `value` is the operand of some `--flag value` pair (and therefore
/// not the command word).
fn is_flag_operand(args: &[String], value: &str) -> bool {
    args.windows(2)
        .any(|w| w[0].starts_with("--") && w[1] == value)
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
