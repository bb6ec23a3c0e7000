//! Parallel viability analysis over a work unit's planned file set.

use super::classifier::{DomainClassifier, OTHER_DOMAIN};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Thresholds a file set must clear to be split into concurrent domain tasks.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AnalysisThresholds {
    #[serde(default = "default_min_files")]
    pub min_files: usize,
    #[serde(default = "default_min_domains")]
    pub min_domains: usize,
    /// Exclusive upper bound on the cross-domain overlap percentage.
    #[serde(default = "default_max_overlap_pct")]
    pub max_overlap_pct: f64,
}

impl Default for AnalysisThresholds {
    fn default() -> Self {
        Self {
            min_files: default_min_files(),
            min_domains: default_min_domains(),
            max_overlap_pct: default_max_overlap_pct(),
        }
    }
}

fn default_min_files() -> usize {
    5
}

fn default_min_domains() -> usize {
    2
}

fn default_max_overlap_pct() -> f64 {
    30.0
}

/// Work assigned to one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainTask {
    pub files: Vec<String>,
    pub task_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub tasks: BTreeMap<String, DomainTask>,
    pub file_count: usize,
    pub domain_count: usize,
    pub overlap_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Parallel,
    Sequential,
}

/// Result of a viability analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelPlan {
    pub viable: bool,
    pub reason: String,
    pub file_count: usize,
    /// Distinct domains excluding `other`.
    pub domain_count: usize,
    /// Full classification, `other` included.
    pub domains: BTreeMap<String, Vec<String>>,
    pub overlap_pct: f64,
    pub recommendation: Recommendation,
    pub plan: Option<ExecutionPlan>,
}

/// Removes repeated paths, keeping the first occurrence.
pub fn dedup_preserving_order(files: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    files
        .iter()
        .filter(|f| seen.insert(f.as_str()))
        .cloned()
        .collect()
}

/// Percentage of files matching rules of two or more domains, rounded to one decimal.
pub fn compute_overlap(classifier: &DomainClassifier, files: &[String]) -> f64 {
    if files.is_empty() {
        return 0.0;
    }
    let shared = files
        .iter()
        .filter(|f| classifier.matching_domains(f).len() > 1)
        .count();
    if shared == 0 {
        return 0.0;
    }
    let pct = shared as f64 / files.len() as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Builds a domain task description, prefixed with the unit description when present.
pub fn task_description(
    unit_description: Option<&str>,
    domain_description: &str,
    file_count: usize,
) -> String {
    let plural = if file_count == 1 { "" } else { "s" };
    match unit_description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(desc) => format!("{desc}: {domain_description} ({file_count} file{plural})"),
        None => format!("{domain_description} ({file_count} file{plural})"),
    }
}

/// Decides whether a file set is worth splitting into concurrent domain tasks.
pub fn analyze(
    classifier: &DomainClassifier,
    files: &[String],
    thresholds: &AnalysisThresholds,
    unit_description: Option<&str>,
) -> ParallelPlan {
    let files = dedup_preserving_order(files);

    let mut domains: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for file in &files {
        domains
            .entry(classifier.classify(file).to_string())
            .or_default()
            .push(file.clone());
    }

    let file_count = files.len();
    let domain_count = domains
        .iter()
        .filter(|(name, members)| name.as_str() != OTHER_DOMAIN && !members.is_empty())
        .count();
    let overlap_pct = compute_overlap(classifier, &files);

    let mut failures = Vec::new();
    if file_count < thresholds.min_files {
        failures.push(format!(
            "too few files ({} < {})",
            file_count, thresholds.min_files
        ));
    }
    if domain_count < thresholds.min_domains {
        failures.push(format!(
            "too few domains ({} < {})",
            domain_count, thresholds.min_domains
        ));
    }
    if overlap_pct >= thresholds.max_overlap_pct {
        failures.push(format!(
            "high overlap ({:.1}% >= {:.1}%)",
            overlap_pct, thresholds.max_overlap_pct
        ));
    }

    let viable = failures.is_empty();
    if !viable {
        return ParallelPlan {
            viable,
            reason: format!("Not viable: {}", failures.join(", ")),
            file_count,
            domain_count,
            domains,
            overlap_pct,
            recommendation: Recommendation::Sequential,
            plan: None,
        };
    }

    let tasks: BTreeMap<String, DomainTask> = domains
        .iter()
        .filter(|(name, members)| name.as_str() != OTHER_DOMAIN && !members.is_empty())
        .map(|(name, members)| {
            let description = classifier
                .description(name)
                .unwrap_or("Implementation tasks");
            (
                name.clone(),
                DomainTask {
                    files: members.clone(),
                    task_description: task_description(
                        unit_description,
                        description,
                        members.len(),
                    ),
                },
            )
        })
        .collect();

    ParallelPlan {
        viable,
        reason: format!(
            "{} files across {} domains with {:.1}% overlap",
            file_count, domain_count, overlap_pct
        ),
        file_count,
        domain_count,
        domains,
        overlap_pct,
        recommendation: Recommendation::Parallel,
        plan: Some(ExecutionPlan {
            tasks,
            file_count,
            domain_count,
            overlap_pct,
        }),
    }
}

#[cfg(test)]
#[path = "tests/analyzer_tests.rs"]
mod tests;
