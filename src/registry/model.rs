use super::coverage::SpecCoverage;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

pub const SCHEMA_VERSION: &str = "2.0";

/// Master spec location relative to the repository root.
pub const DEFAULT_MASTER_SPEC_PATH: &str = ".tasks/master_spec.md";

/// Unit lifecycle. Declaration order is the only allowed direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Defined,
    Prepared,
    Ready,
    Implemented,
    Archived,
}

impl UnitStatus {
    pub const ALL: [UnitStatus; 5] = [
        Self::Defined,
        Self::Prepared,
        Self::Ready,
        Self::Implemented,
        Self::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Defined => "defined",
            Self::Prepared => "prepared",
            Self::Ready => "ready",
            Self::Implemented => "implemented",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UnitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown unit status: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    /// Units this one blocks. Maintained as the reverse of `blocked_by`.
    #[serde(default)]
    pub blocks: BTreeSet<String>,
    #[serde(default)]
    pub blocked_by: BTreeSet<String>,
    #[serde(default)]
    pub integrates_with: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub unit_id: String,
    pub unit_number: u32,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: UnitStatus,
    pub created_date: NaiveDate,
    #[serde(default)]
    pub prepared_date: Option<NaiveDate>,
    #[serde(default)]
    pub ready_date: Option<NaiveDate>,
    #[serde(default)]
    pub implemented_date: Option<NaiveDate>,
    #[serde(default)]
    pub archived_date: Option<NaiveDate>,
    /// Unit directory relative to the repository root.
    pub directory: String,
    #[serde(default)]
    pub tracker_issue: Option<u64>,
    #[serde(default)]
    pub tracker_url: Option<String>,
    #[serde(default)]
    pub execution_mode: Option<ExecutionMode>,
    #[serde(default)]
    pub files_created: Option<u32>,
    #[serde(default)]
    pub files_modified: Option<u32>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub dependencies: Dependencies,
}

impl WorkUnit {
    /// Sets the status, stamping its date on first entry.
    pub(crate) fn enter(&mut self, status: UnitStatus, today: NaiveDate) {
        self.status = status;
        let slot = match status {
            UnitStatus::Defined => None,
            UnitStatus::Prepared => Some(&mut self.prepared_date),
            UnitStatus::Ready => Some(&mut self.ready_date),
            UnitStatus::Implemented => Some(&mut self.implemented_date),
            UnitStatus::Archived => Some(&mut self.archived_date),
        };
        if let Some(slot) = slot {
            slot.get_or_insert(today);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStatistics {
    pub total: usize,
    pub defined: usize,
    pub prepared: usize,
    pub ready: usize,
    pub implemented: usize,
    pub archived: usize,
}

impl RegistryStatistics {
    pub fn compute(units: &[WorkUnit]) -> Self {
        let mut stats = Self {
            total: units.len(),
            ..Self::default()
        };
        for unit in units {
            let counter = match unit.status {
                UnitStatus::Defined => &mut stats.defined,
                UnitStatus::Prepared => &mut stats.prepared,
                UnitStatus::Ready => &mut stats.ready,
                UnitStatus::Implemented => &mut stats.implemented,
                UnitStatus::Archived => &mut stats.archived,
            };
            *counter += 1;
        }
        stats
    }
}

/// On-disk registry document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryData {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub project_name: String,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default = "default_next_unit_number")]
    pub next_unit_number: u32,
    #[serde(default)]
    pub statistics: RegistryStatistics,
    #[serde(default)]
    pub units: Vec<WorkUnit>,
    /// Master spec whose `REQ-` requirements units are measured against.
    #[serde(default = "default_master_spec_path")]
    pub master_spec_path: PathBuf,
    /// Last computed requirement coverage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_spec_coverage: Option<SpecCoverage>,
    /// Top-level fields written by other tools, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_master_spec_path() -> PathBuf {
    PathBuf::from(DEFAULT_MASTER_SPEC_PATH)
}

fn default_next_unit_number() -> u32 {
    1
}

/// Formats a unit number as its stable string ID.
pub fn unit_id_for(number: u32) -> String {
    format!("UNIT-{:03}", number)
}

/// Lowercase, hyphen-separated slug from free text.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if (c.is_whitespace() || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
