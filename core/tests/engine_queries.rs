//! Engine-level query surface:
//! 1. The directory loads from disk, normalizing the literal "null" team
//! 2. filter_options combines directory values with store distincts
//! 3. policy_mapping resolves policies to agent names, first occurrence wins
//! 4. KPI windows run end-to-end through the engine with a branch filter

use std::fs;
use std::path::Path;

use autopolicy_core::config::PipelineConfig;
use autopolicy_core::filter::{DataScope, FilterSpec};
use autopolicy_core::ReportEngine;
use chrono::NaiveDate;

const HEADER: &str =
    "policy_id,confirmed_at,premium,unit_count,commission,agent,renewal_status,new_energy\n";

const MAPPING: &str = r#"{
  "100231张伟": { "branch": "Branch-A", "sub_branch": "North", "team": "Team-1" },
  "100232李丽": { "branch": "Branch-B", "sub_branch": "South", "team": "null" }
}"#;

fn setup(dir: &Path) -> (ReportEngine, PipelineConfig) {
    let config = PipelineConfig::rooted_at(dir);
    fs::create_dir_all(&config.inbox_dir).expect("create inbox");
    fs::write(&config.mapping_path, MAPPING).expect("write mapping");
    fs::write(
        config.inbox_dir.join("extract.csv"),
        format!(
            "{HEADER}P1,2025-03-01 09:15:00,100,1,10,100231张伟,new,yes\n\
             P1,2025-03-05 09:15:00,300,1,30,100231张伟,renewal,no\n\
             P2,2025-03-05 16:40:00,200,1,20,100232李丽,renewal,no\n"
        ),
    )
    .expect("write extract");

    let engine = ReportEngine::open(config.clone()).expect("open engine");
    engine.refresh_data().expect("ingest");
    (engine, config)
}

fn date(text: &str) -> NaiveDate {
    text.parse().expect("valid test date")
}

#[test]
fn directory_loads_and_normalizes_null_team() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, _) = setup(dir.path());

    let info = engine.directory().get("100232李丽").expect("entry exists");
    assert_eq!(info.branch, "Branch-B");
    assert_eq!(info.team, None, "the literal string \"null\" means no team");
}

#[test]
fn filter_options_combine_directory_and_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, _) = setup(dir.path());

    let options = engine.filter_options().expect("options");

    assert_eq!(options.branches, vec!["Branch-A", "Branch-B"]);
    assert_eq!(options.teams, vec!["Team-1"]);
    assert_eq!(options.branch_teams["Branch-A"], vec!["Team-1"]);
    assert!(options.branch_teams["Branch-B"].is_empty());
    assert_eq!(options.renewal_status, vec!["new", "renewal"]);
    assert_eq!(options.policy_ids, vec!["P1", "P2"]);
}

#[test]
fn policy_mapping_resolves_names_first_occurrence_wins() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, _) = setup(dir.path());

    let view = engine.policy_mapping().expect("mapping view");

    assert_eq!(view.policy_to_agent["P1"], "张伟");
    assert_eq!(view.policy_to_agent["P2"], "李丽");
    assert_eq!(view.agent_info["张伟"].branch, "Branch-A");
    assert!(view.conflicts.is_empty());
}

#[test]
fn kpi_windows_respect_branch_filter_through_the_engine() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, _) = setup(dir.path());

    let spec = FilterSpec {
        branch: Some("Branch-A".to_string()),
        ..FilterSpec::default()
    };
    let kpi = engine
        .kpi_windows(None, &spec, DataScope::ExcludeCorrections)
        .expect("query ok")
        .expect("data exists");

    assert_eq!(kpi.anchor_date, date("2025-03-05"));
    assert_eq!(kpi.premium.day, 300.0, "only 张伟's rows survive the filter");
    assert_eq!(kpi.premium.last7d, 400.0);
    assert_eq!(
        kpi.ratios.new_policy.premium.last7d, 0.25,
        "100 of 400 premium came from first-time policies"
    );
    assert!(kpi.validation.unmatched_agents.is_empty());
}
