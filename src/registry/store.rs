use super::coverage::{compute_coverage, RequirementScanner, SpecCoverage};
use super::graph::{dependency_graph, find_cycle, topological_order};
use super::model::{
    slugify, unit_id_for, Dependencies, ExecutionMode, RegistryData, RegistryStatistics,
    UnitStatus, WorkUnit, DEFAULT_MASTER_SPEC_PATH, SCHEMA_VERSION,
};
use crate::error::{RegistryError, RegistryResult};
use crate::fs_util::{read_json, write_json_atomic};
use chrono::{NaiveDate, Utc};
use serde_json::Map;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Handle to one registry file. All unit mutations go through it.
///
/// Mutations are in-memory until [`Registry::save`]. Every integrity check
/// runs before anything is changed.
#[derive(Debug, Clone)]
pub struct Registry {
    data: RegistryData,
    path: PathBuf,
}

/// Fields for a unit built by [`Registry::new_unit`].
#[derive(Debug, Clone, Default)]
pub struct NewUnit {
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    pub blocked_by: BTreeSet<String>,
    pub integrates_with: BTreeSet<String>,
}

impl Registry {
    /// Creates and saves an empty registry. Fails if the file already exists.
    pub fn init(path: &Path, project_name: &str) -> RegistryResult<Self> {
        if path.exists() {
            return Err(RegistryError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("registry already exists: {}", path.display()),
            )));
        }
        let now = Utc::now();
        let mut registry = Self {
            data: RegistryData {
                schema_version: SCHEMA_VERSION.to_string(),
                project_name: project_name.to_string(),
                created: now,
                last_updated: now,
                next_unit_number: 1,
                statistics: RegistryStatistics::default(),
                units: Vec::new(),
                master_spec_path: PathBuf::from(DEFAULT_MASTER_SPEC_PATH),
                master_spec_coverage: None,
                extra: Map::new(),
            },
            path: path.to_path_buf(),
        };
        registry.save()?;
        info!(path = %path.display(), project = %project_name, "Initialized unit registry");
        Ok(registry)
    }

    pub fn load(path: &Path) -> RegistryResult<Self> {
        let data: RegistryData = read_json::<_, RegistryError>(path)?;
        Ok(Self {
            data,
            path: path.to_path_buf(),
        })
    }

    /// Recomputes statistics, stamps `last_updated`, and writes atomically.
    pub fn save(&mut self) -> RegistryResult<()> {
        self.data.statistics = RegistryStatistics::compute(&self.data.units);
        self.data.last_updated = Utc::now();
        write_json_atomic::<_, RegistryError>(&self.path, &self.data)?;
        debug!(path = %self.path.display(), units = self.data.units.len(), "Saved unit registry");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &RegistryData {
        &self.data
    }

    pub fn units(&self) -> &[WorkUnit] {
        &self.data.units
    }

    pub fn next_unit_id(&self) -> String {
        unit_id_for(self.data.next_unit_number)
    }

    pub fn get(&self, unit_id: &str) -> Option<&WorkUnit> {
        self.data.units.iter().find(|u| u.unit_id == unit_id)
    }

    fn get_mut(&mut self, unit_id: &str) -> RegistryResult<&mut WorkUnit> {
        self.data
            .units
            .iter_mut()
            .find(|u| u.unit_id == unit_id)
            .ok_or_else(|| RegistryError::UnknownUnit(unit_id.to_string()))
    }

    /// Builds a `defined` unit carrying the next number and ID, dated today.
    ///
    /// The unit is not added until passed to [`Registry::create`].
    pub fn new_unit(&self, spec: NewUnit) -> WorkUnit {
        let number = self.data.next_unit_number;
        let unit_id = unit_id_for(number);
        let slug = spec
            .slug
            .map(|s| slugify(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(&spec.title));
        WorkUnit {
            directory: format!(".tasks/units/{}-{}", unit_id, slug),
            unit_id,
            unit_number: number,
            title: spec.title,
            slug,
            description: spec.description,
            status: UnitStatus::Defined,
            created_date: today(),
            prepared_date: None,
            ready_date: None,
            implemented_date: None,
            archived_date: None,
            tracker_issue: None,
            tracker_url: None,
            execution_mode: None,
            files_created: None,
            files_modified: None,
            tags: spec.tags,
            dependencies: Dependencies {
                blocks: BTreeSet::new(),
                blocked_by: spec.blocked_by,
                integrates_with: spec.integrates_with,
            },
        }
    }

    /// Adds a unit after integrity checks.
    ///
    /// Rejects a duplicate ID, a number other than `next_unit_number`, a
    /// self-dependency, a `blocks` target that is not registered, or a
    /// dependency cycle. On success the counter advances, each existing
    /// blocker gains a reciprocal `blocks` edge, and each unit in `blocks`
    /// gains a reciprocal `blocked_by` edge.
    pub fn create(&mut self, unit: WorkUnit) -> RegistryResult<()> {
        if self.get(&unit.unit_id).is_some() {
            return Err(RegistryError::DuplicateId(unit.unit_id));
        }
        if unit.unit_number != self.data.next_unit_number {
            return Err(RegistryError::OutOfSequence {
                expected: self.data.next_unit_number,
                actual: unit.unit_number,
            });
        }
        check_self_dependency(&unit.unit_id, &unit.dependencies)?;
        if let Some(missing) = unit.dependencies.blocks.iter().find(|id| self.get(id).is_none()) {
            return Err(RegistryError::UnknownUnit(missing.clone()));
        }

        let mut graph = dependency_graph(&self.data.units);
        graph.insert(unit.unit_id.clone(), unit.dependencies.blocked_by.clone());
        for target in &unit.dependencies.blocks {
            graph
                .entry(target.clone())
                .or_default()
                .insert(unit.unit_id.clone());
        }
        if let Some(cycle) = find_cycle(&graph) {
            return Err(RegistryError::DependencyCycle(cycle));
        }

        for blocker in &unit.dependencies.blocked_by {
            if let Ok(existing) = self.get_mut(blocker) {
                existing.dependencies.blocks.insert(unit.unit_id.clone());
            }
        }
        for target in &unit.dependencies.blocks {
            self.get_mut(target)?
                .dependencies
                .blocked_by
                .insert(unit.unit_id.clone());
        }
        info!(unit = %unit.unit_id, title = %unit.title, "Added unit");
        self.data.units.push(unit);
        self.data.next_unit_number += 1;
        Ok(())
    }

    /// Moves a unit forward in its lifecycle.
    ///
    /// Returns `false` when the unit already has `status`. A move backwards
    /// fails with [`RegistryError::StatusRegression`].
    pub fn update_status(&mut self, unit_id: &str, status: UnitStatus) -> RegistryResult<bool> {
        let unit = self.get_mut(unit_id)?;
        if unit.status == status {
            return Ok(false);
        }
        if status < unit.status {
            return Err(RegistryError::StatusRegression {
                unit_id: unit_id.to_string(),
                from: unit.status.to_string(),
                to: status.to_string(),
            });
        }
        let previous = unit.status;
        unit.enter(status, today());
        info!(unit = %unit_id, from = %previous, to = %status, "Updated unit status");
        Ok(true)
    }

    /// Replaces a unit's `blocked_by` and `integrates_with` sets.
    pub fn set_dependencies(
        &mut self,
        unit_id: &str,
        blocked_by: BTreeSet<String>,
        integrates_with: BTreeSet<String>,
    ) -> RegistryResult<()> {
        let current = self
            .get(unit_id)
            .ok_or_else(|| RegistryError::UnknownUnit(unit_id.to_string()))?;
        let proposed = Dependencies {
            blocks: current.dependencies.blocks.clone(),
            blocked_by,
            integrates_with,
        };
        check_self_dependency(unit_id, &proposed)?;

        let mut graph = dependency_graph(&self.data.units);
        graph.insert(unit_id.to_string(), proposed.blocked_by.clone());
        if let Some(cycle) = find_cycle(&graph) {
            return Err(RegistryError::DependencyCycle(cycle));
        }

        let previous = current.dependencies.blocked_by.clone();
        for dropped in previous.difference(&proposed.blocked_by) {
            if let Ok(blocker) = self.get_mut(dropped) {
                blocker.dependencies.blocks.remove(unit_id);
            }
        }
        for added in proposed.blocked_by.difference(&previous) {
            if let Ok(blocker) = self.get_mut(added) {
                blocker.dependencies.blocks.insert(unit_id.to_string());
            }
        }
        self.get_mut(unit_id)?.dependencies = proposed;
        Ok(())
    }

    /// Records how a unit was executed and how many files it touched.
    pub fn record_execution(
        &mut self,
        unit_id: &str,
        mode: ExecutionMode,
        files_created: Option<u32>,
        files_modified: Option<u32>,
    ) -> RegistryResult<()> {
        let unit = self.get_mut(unit_id)?;
        unit.execution_mode = Some(mode);
        if files_created.is_some() {
            unit.files_created = files_created;
        }
        if files_modified.is_some() {
            unit.files_modified = files_modified;
        }
        Ok(())
    }

    pub fn set_tracker(&mut self, unit_id: &str, issue: u64, url: &str) -> RegistryResult<()> {
        let unit = self.get_mut(unit_id)?;
        unit.tracker_issue = Some(issue);
        unit.tracker_url = Some(url.to_string());
        Ok(())
    }

    /// Points coverage at a different master spec, relative to the repository.
    pub fn set_master_spec_path(&mut self, path: impl Into<PathBuf>) {
        self.data.master_spec_path = path.into();
        self.data.master_spec_coverage = None;
    }

    /// Recomputes requirement coverage against the files under `repo_root`
    /// and stores it on the registry.
    pub fn refresh_coverage(&mut self, repo_root: &Path) -> RegistryResult<&SpecCoverage> {
        let scanner = RequirementScanner::new()?;
        let coverage = compute_coverage(&scanner, repo_root, &self.data)?;
        info!(
            total = coverage.total_requirements,
            covered = coverage.covered_requirements,
            pct = coverage.coverage_pct,
            "Computed requirement coverage"
        );
        Ok(self.data.master_spec_coverage.insert(coverage))
    }

    pub fn units_by_status(&self, status: UnitStatus) -> Vec<&WorkUnit> {
        self.data
            .units
            .iter()
            .filter(|u| u.status == status)
            .collect()
    }

    /// Unit IDs ordered so that every unit follows its blockers.
    pub fn topological_order(&self) -> RegistryResult<Vec<String>> {
        topological_order(&dependency_graph(&self.data.units))
    }

    /// The first dependency cycle among stored units, if any.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        find_cycle(&dependency_graph(&self.data.units))
    }
}

fn check_self_dependency(unit_id: &str, deps: &Dependencies) -> RegistryResult<()> {
    if deps.blocked_by.contains(unit_id)
        || deps.blocks.contains(unit_id)
        || deps.integrates_with.contains(unit_id)
    {
        return Err(RegistryError::SelfDependency(unit_id.to_string()));
    }
    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
