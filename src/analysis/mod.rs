//! Domain classification and parallel viability analysis.

pub mod analyzer;
pub mod classifier;
pub mod file_tasks;

pub use analyzer::{
    analyze, dedup_preserving_order, task_description, AnalysisThresholds, DomainTask,
    ExecutionPlan, ParallelPlan, Recommendation,
};
pub use classifier::{default_domains, DomainClassifier, DomainSpec, Matcher, OTHER_DOMAIN};
pub use file_tasks::parse_file_tasks;
