//! Shell-command verifier and repair worker.

use super::{RepairReport, RepairWorker, Verification, Verifier};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

fn shell(command: &str, cwd: &Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}

/// Runs the verify command; exit status zero means passed.
#[derive(Debug, Clone)]
pub struct CommandVerifier {
    command: String,
    cwd: PathBuf,
}

impl CommandVerifier {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
        }
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    async fn verify(&self) -> Verification {
        debug!(command = %self.command, "Running verify command");
        match shell(&self.command, &self.cwd).stdin(Stdio::null()).output().await {
            Ok(output) => Verification {
                passed: output.status.success(),
                diagnostics: combined_output(&output),
            },
            Err(e) => {
                warn!(command = %self.command, error = %e, "Verify command could not run");
                Verification {
                    passed: false,
                    diagnostics: format!("Failed to run verify command '{}': {}", self.command, e),
                }
            }
        }
    }
}

/// Runs the repair command with diagnostics on stdin and in
/// `UNITFLOW_DIAGNOSTICS`.
///
/// A JSON report on the last stdout line wins. Otherwise the exit status
/// decides success, and on failure the output lines become `unresolved`.
#[derive(Debug, Clone)]
pub struct CommandRepairWorker {
    command: String,
    cwd: PathBuf,
}

impl CommandRepairWorker {
    pub fn new(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            cwd: cwd.into(),
        }
    }

    async fn run(&self, diagnostics: &str) -> std::io::Result<std::process::Output> {
        let mut child = shell(&self.command, &self.cwd)
            .env("UNITFLOW_DIAGNOSTICS", diagnostics)
            .stdin(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            let input = diagnostics.to_string();
            tokio::spawn(async move {
                let _ = stdin.write_all(input.as_bytes()).await;
            });
        }
        child.wait_with_output().await
    }
}

#[async_trait]
impl RepairWorker for CommandRepairWorker {
    async fn repair(&self, diagnostics: &str) -> RepairReport {
        let output = match self.run(diagnostics).await {
            Ok(output) => output,
            Err(e) => {
                warn!(command = %self.command, error = %e, "Repair command could not run");
                return RepairReport {
                    success: false,
                    fixes_applied: Vec::new(),
                    unresolved: vec![format!("Failed to run repair command: {}", e)],
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let reported = stdout
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .and_then(|l| serde_json::from_str::<RepairReport>(l).ok());
        if let Some(report) = reported {
            return report;
        }

        let success = output.status.success();
        let unresolved = if success {
            Vec::new()
        } else {
            combined_output(&output)
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        };
        RepairReport {
            success,
            fixes_applied: Vec::new(),
            unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{run_validation_loop, ValidationOutcome};
    use tempfile::TempDir;

    #[tokio::test]
    async fn verifier_captures_output_and_status() {
        let dir = TempDir::new().unwrap();
        let failing = CommandVerifier::new("echo out; echo err >&2; exit 1", dir.path());
        let result = failing.verify().await;
        assert!(!result.passed);
        assert_eq!(result.diagnostics, "out\nerr\n");

        let passing = CommandVerifier::new("true", dir.path());
        assert!(passing.verify().await.passed);
    }

    #[tokio::test]
    async fn repair_receives_diagnostics_on_stdin_and_env() {
        let dir = TempDir::new().unwrap();
        let repairer = CommandRepairWorker::new(
            r#"cat > stdin.txt; printf '%s' "$UNITFLOW_DIAGNOSTICS" > env.txt"#,
            dir.path(),
        );

        let report = repairer.repair("E0308 mismatched types").await;

        assert!(report.success);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("stdin.txt")).unwrap(),
            "E0308 mismatched types"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("env.txt")).unwrap(),
            "E0308 mismatched types"
        );
    }

    #[tokio::test]
    async fn repair_json_report_wins() {
        let dir = TempDir::new().unwrap();
        let repairer = CommandRepairWorker::new(
            r#"echo thinking; echo '{"success": false, "fixes_applied": ["a"], "unresolved": ["b"]}'; exit 0"#,
            dir.path(),
        );
        let report = repairer.repair("diag").await;
        assert_eq!(
            report,
            RepairReport {
                success: false,
                fixes_applied: vec!["a".into()],
                unresolved: vec!["b".into()],
            }
        );
    }

    #[tokio::test]
    async fn failed_repair_lists_output_as_unresolved() {
        let dir = TempDir::new().unwrap();
        let repairer = CommandRepairWorker::new("echo 'cannot fix x'; exit 2", dir.path());
        let report = repairer.repair("diag").await;
        assert!(!report.success);
        assert_eq!(report.unresolved, vec!["cannot fix x"]);
    }

    #[tokio::test]
    async fn repair_command_fixes_what_verify_checks() {
        let dir = TempDir::new().unwrap();
        let verifier = CommandVerifier::new("test -f fixed", dir.path());
        let repairer = CommandRepairWorker::new("touch fixed", dir.path());

        let report = run_validation_loop(&verifier, Some(&repairer), 3).await;

        assert_eq!(report.outcome, ValidationOutcome::Passed { attempts: 2 });
        assert!(report.attempts[0].repair.as_ref().is_some_and(|r| r.success));
    }
}
