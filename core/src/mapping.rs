//! The agent → organization reference mapping.
//!
//! Keys in the mapping file are composite "employee-id + name" strings; rows
//! in the transactional data carry the same composite form. Name-based
//! lookups go through a derived name index, and two entries that share a
//! name but disagree on organization or team are surfaced as conflicts —
//! never silently resolved.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;

/// Organizational attributes of one directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgAssignment {
    pub branch: String,
    #[serde(default)]
    pub sub_branch: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

/// Parsed form of a composite agent key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Option<String>,
    pub name: String,
}

static NAME_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Split a raw agent key into employee id and human name.
///
/// Keys concatenate a numeric employee id and a name ("100231张伟"). A bare
/// name parses to `id: None`; a key with no alphabetic run yields an empty
/// name, which callers treat as unresolvable. This is the only place the
/// composite format is interpreted.
pub fn resolve_identity(raw: &str) -> Identity {
    let trimmed = raw.trim();
    let id: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    let pattern = NAME_PATTERN
        .get_or_init(|| Regex::new(r"\p{Alphabetic}+").expect("hard-coded pattern"));
    let name = pattern
        .find(trimmed)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Identity {
        id: (!id.is_empty()).then_some(id),
        name,
    }
}

/// The agent directory, loaded once at engine construction and read-only
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct AgentDirectory {
    entries: BTreeMap<String, OrgAssignment>,
}

impl AgentDirectory {
    /// Load the mapping file. A missing file loads as an empty directory,
    /// not an error.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            log::warn!("agent mapping {} not found, directory is empty", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let mut entries: BTreeMap<String, OrgAssignment> = serde_json::from_str(&raw)?;
        for entry in entries.values_mut() {
            // Some exports serialize a missing team as the string "null".
            if entry.team.as_deref() == Some("null") {
                entry.team = None;
            }
        }
        log::info!("loaded {} agent directory entries", entries.len());
        Ok(Self { entries })
    }

    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, OrgAssignment)>,
        K: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, composite_key: &str) -> Option<&OrgAssignment> {
        self.entries.get(composite_key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &OrgAssignment)> {
        self.entries.iter()
    }

    /// Name → organization view, plus the names whose entries disagree.
    /// The last entry (in key order) wins inside the index; the conflict
    /// list tells callers which names are ambiguous.
    pub fn name_index(&self) -> (HashMap<String, OrgAssignment>, Vec<String>) {
        let mut index: HashMap<String, OrgAssignment> = HashMap::new();
        let mut conflicts = Vec::new();
        for (key, info) in &self.entries {
            let name = resolve_identity(key).name;
            if name.is_empty() {
                continue;
            }
            if let Some(existing) = index.get(&name) {
                if existing != info {
                    conflicts.push(name.clone());
                }
            }
            index.insert(name, info.clone());
        }
        conflicts.sort();
        conflicts.dedup();
        (index, conflicts)
    }

    /// All composite keys whose extracted name equals `name`.
    pub fn keys_with_name(&self, name: &str) -> Vec<&str> {
        self.entries
            .keys()
            .filter(|key| resolve_identity(key).name == name)
            .map(String::as_str)
            .collect()
    }

    pub fn keys_with_branch(&self, branch: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, info)| info.branch == branch)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    pub fn keys_with_team(&self, team: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, info)| info.team.as_deref() == Some(team))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Sorted distinct branch names.
    pub fn branches(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .entries
            .values()
            .map(|info| info.branch.as_str())
            .filter(|b| !b.is_empty())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Sorted distinct team names.
    pub fn teams(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self
            .entries
            .values()
            .filter_map(|info| info.team.as_deref())
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Branch → sorted teams under it.
    pub fn branch_team_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for info in self.entries.values() {
            if info.branch.is_empty() {
                continue;
            }
            let teams = map.entry(info.branch.clone()).or_default();
            if let Some(team) = &info.team {
                teams.insert(team.clone());
            }
        }
        map.into_iter()
            .map(|(branch, teams)| (branch, teams.into_iter().collect()))
            .collect()
    }
}
