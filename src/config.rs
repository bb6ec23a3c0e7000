use crate::analysis::{default_domains, AnalysisThresholds, DomainSpec, OTHER_DOMAIN};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// File name looked up at the repository root when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "unitflow.yaml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnitflowConfig {
    #[serde(default)]
    pub analysis: AnalysisThresholds,
    /// Ordered classification rules; first match wins.
    #[serde(default = "default_domains")]
    pub domains: Vec<DomainSpec>,
    /// Integration order for domain branches. Domains missing here merge last, by name.
    #[serde(default = "default_merge_order")]
    pub merge_order: Vec<String>,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

fn default_merge_order() -> Vec<String> {
    ["database", "backend", "frontend", "tests", "docs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// Directory (relative to the repository) holding worktrees and metadata.
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    #[serde(default = "default_abandoned_after_days")]
    pub abandoned_after_days: u32,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            base_branch: default_base_branch(),
            abandoned_after_days: default_abandoned_after_days(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".worktrees")
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_abandoned_after_days() -> u32 {
    7
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Executable run once per domain inside its workspace.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Wall-clock limit per worker. Default: 6 hours
    #[serde(default = "default_worker_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: default_worker_timeout_secs(),
        }
    }
}

fn default_worker_timeout_secs() -> u64 {
    6 * 60 * 60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    /// Maximum verification invocations per run. Default: 3
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Shell command run in the repository after a successful merge.
    #[serde(default)]
    pub verify: Option<String>,
    /// Shell command fed the failing diagnostics on stdin.
    #[serde(default)]
    pub repair: Option<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            verify: None,
            repair: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from(".tasks/unit_registry.json")
}

impl UnitflowConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file as YAML: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Result<Self> {
        const DEFAULT_CONFIG_YAML: &str = include_str!("../unitflow.yaml");

        let config: Self = serde_yaml::from_str(DEFAULT_CONFIG_YAML)
            .context("Failed to parse embedded unitflow.yaml")?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the configuration for a repository.
    ///
    /// An explicit path wins, then `<repo>/unitflow.yaml`, then the embedded default.
    pub fn resolve(repo_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = repo_root.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Self::load(&candidate);
        }
        Self::default_config()
    }

    pub fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            anyhow::bail!("At least one domain must be configured");
        }

        let mut seen = HashSet::new();
        for domain in &self.domains {
            if domain.name == OTHER_DOMAIN {
                anyhow::bail!("Domain name '{}' is reserved", OTHER_DOMAIN);
            }
            if !seen.insert(domain.name.as_str()) {
                anyhow::bail!("Duplicate domain '{}' in domains configuration", domain.name);
            }
            domain
                .compile()
                .with_context(|| format!("Invalid patterns for domain '{}'", domain.name))?;
        }

        for name in &self.merge_order {
            if !seen.contains(name.as_str()) {
                anyhow::bail!(
                    "merge_order entry '{}' not found in domains configuration",
                    name
                );
            }
        }

        if self.validation.max_attempts == 0 {
            anyhow::bail!("validation.max_attempts must be at least 1");
        }

        Ok(())
    }

    /// Returns the workspace root resolved against the repository.
    pub fn workspace_root(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.workspace.root)
    }

    /// Returns the registry file path resolved against the repository.
    pub fn registry_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.registry.path)
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
