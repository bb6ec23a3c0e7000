//! Bounded validate → repair → re-validate loop run after a successful merge.

mod command;

pub use command::{CommandRepairWorker, CommandVerifier};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Result of one verification run.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub passed: bool,
    pub diagnostics: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    pub success: bool,
    #[serde(default)]
    pub fixes_applied: Vec<String>,
    #[serde(default)]
    pub unresolved: Vec<String>,
}

#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self) -> Verification;
}

#[async_trait]
pub trait RepairWorker: Send + Sync {
    async fn repair(&self, diagnostics: &str) -> RepairReport;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationAttempt {
    pub attempt: u32,
    pub passed: bool,
    pub diagnostics: String,
    /// Repair run after this attempt failed, if any.
    #[serde(default)]
    pub repair: Option<RepairReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Passed { attempts: u32 },
    Exhausted { attempts: u32 },
    /// No verifier configured.
    Skipped,
}

impl ValidationOutcome {
    pub fn is_passed(self) -> bool {
        !matches!(self, Self::Exhausted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub outcome: ValidationOutcome,
    pub attempts: Vec<ValidationAttempt>,
    #[serde(default)]
    pub note: Option<String>,
}

impl ValidationReport {
    pub fn skipped(note: impl Into<String>) -> Self {
        Self {
            outcome: ValidationOutcome::Skipped,
            attempts: Vec::new(),
            note: Some(note.into()),
        }
    }
}

/// Validates up to `max_attempts` times, repairing between failed attempts.
///
/// Every attempt is retained. Without a repair worker the loop stops after
/// the first failure, since re-validating unchanged code cannot pass.
pub async fn run_validation_loop(
    verifier: &dyn Verifier,
    repairer: Option<&dyn RepairWorker>,
    max_attempts: u32,
) -> ValidationReport {
    let mut attempts: Vec<ValidationAttempt> = Vec::new();

    for attempt in 1..=max_attempts {
        let verification = verifier.verify().await;
        if verification.passed {
            info!(attempt, "Validation passed");
            attempts.push(ValidationAttempt {
                attempt,
                passed: true,
                diagnostics: verification.diagnostics,
                repair: None,
            });
            return ValidationReport {
                outcome: ValidationOutcome::Passed { attempts: attempt },
                attempts,
                note: None,
            };
        }

        warn!(attempt, max_attempts, "Validation failed");
        let repair = match repairer {
            Some(repairer) if attempt < max_attempts => {
                let report = repairer.repair(&verification.diagnostics).await;
                info!(
                    attempt,
                    success = report.success,
                    fixes = report.fixes_applied.len(),
                    unresolved = report.unresolved.len(),
                    "Repair finished"
                );
                Some(report)
            }
            _ => None,
        };
        let stop = repair.is_none();
        attempts.push(ValidationAttempt {
            attempt,
            passed: false,
            diagnostics: verification.diagnostics,
            repair,
        });
        if stop {
            break;
        }
    }

    let used = attempts.len() as u32;
    let note = (used < max_attempts).then(|| "No repair worker configured".to_string());
    ValidationReport {
        outcome: ValidationOutcome::Exhausted { attempts: used },
        attempts,
        note,
    }
}
