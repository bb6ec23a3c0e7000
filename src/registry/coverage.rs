//! Requirement coverage of the master spec by registered units.
//!
//! The master spec lists requirements as `- REQ-001: ...`, `## REQ-002` or
//! `**REQ-003**`. A unit covers a requirement when its `spec.md` mentions the
//! ID anywhere. Archived units no longer count.

use super::model::{RegistryData, UnitStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io;
use std::path::Path;

/// Per-unit spec file, relative to the unit directory.
pub const UNIT_SPEC_FILE: &str = "spec.md";

/// Uncovered requirements suggested for the next unit.
pub const SUGGESTION_LIMIT: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecCoverage {
    pub total_requirements: usize,
    pub covered_requirements: usize,
    /// Rounded to one decimal; 0.0 when the master spec lists nothing.
    pub coverage_pct: f64,
    #[serde(default)]
    pub uncovered_requirements: Vec<String>,
}

impl SpecCoverage {
    /// The first few uncovered requirements, in master-spec order.
    pub fn suggested(&self) -> &[String] {
        let n = self.uncovered_requirements.len().min(SUGGESTION_LIMIT);
        &self.uncovered_requirements[..n]
    }
}

pub struct RequirementScanner {
    declared: Regex,
    mentioned: Regex,
}

impl RequirementScanner {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // "- REQ-001: ...", "## REQ-002", "**REQ-003**"
            declared: Regex::new(r"(?m)(?:^|[-#*\s])(REQ-\d+)\b")?,
            mentioned: Regex::new(r"\bREQ-\d+\b")?,
        })
    }

    /// Sorted, de-duplicated requirement IDs declared in the master spec.
    pub fn declared(&self, markdown: &str) -> Vec<String> {
        self.declared
            .captures_iter(markdown)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every requirement ID mentioned anywhere in a unit spec.
    pub fn mentioned(&self, markdown: &str) -> BTreeSet<String> {
        self.mentioned
            .find_iter(markdown)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Reads `path`, treating a missing file as empty.
fn read_optional(path: &Path) -> io::Result<String> {
    match std::fs::read_to_string(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        other => other,
    }
}

/// Measures how much of the master spec the non-archived units reference.
///
/// IDs a unit mentions that the master spec does not declare are ignored.
pub fn compute_coverage(
    scanner: &RequirementScanner,
    repo_root: &Path,
    data: &RegistryData,
) -> io::Result<SpecCoverage> {
    let requirements = scanner.declared(&read_optional(&repo_root.join(&data.master_spec_path))?);
    if requirements.is_empty() {
        return Ok(SpecCoverage::default());
    }

    let mut mentioned = BTreeSet::new();
    for unit in data.units.iter().filter(|u| u.status != UnitStatus::Archived) {
        let spec = read_optional(&repo_root.join(&unit.directory).join(UNIT_SPEC_FILE))?;
        mentioned.extend(scanner.mentioned(&spec));
    }

    let (covered, uncovered): (Vec<String>, Vec<String>) = requirements
        .iter()
        .cloned()
        .partition(|req| mentioned.contains(req));
    let pct = covered.len() as f64 / requirements.len() as f64 * 100.0;
    Ok(SpecCoverage {
        total_requirements: requirements.len(),
        covered_requirements: covered.len(),
        coverage_pct: (pct * 10.0).round() / 10.0,
        uncovered_requirements: uncovered,
    })
}
