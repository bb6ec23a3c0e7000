//! Work unit registry: lifecycle, dependencies, and next-unit selection.

pub mod coverage;
pub mod graph;
pub mod model;
pub mod selector;
pub mod store;

pub use coverage::{compute_coverage, RequirementScanner, SpecCoverage};
pub use graph::{dependency_graph, find_cycle, topological_order, DependencyGraph};
pub use model::{
    slugify, unit_id_for, Dependencies, ExecutionMode, RegistryData, RegistryStatistics,
    UnitStatus, WorkUnit, DEFAULT_MASTER_SPEC_PATH, SCHEMA_VERSION,
};
pub use selector::{blocked_units, is_blocked, ready_unblocked_units, select_next, Priority, Selection};
pub use store::{NewUnit, Registry};
