//! Process-backed execution worker.

use super::{ExecutionWorker, WorkerRequest, WorkerResult};
use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Wall-clock limit for one worker process.
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(21600); // 6 hours

/// Lines of stderr kept when a worker exits without a result.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct WorkerCommandConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl WorkerCommandConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_WORKER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Runs a configured command inside the workspace.
///
/// The process sees `UNITFLOW_DOMAIN`, `UNITFLOW_WORKSPACE`, `UNITFLOW_TASK`,
/// `UNITFLOW_FILES` (newline separated) and `UNITFLOW_RESULT`. It reports by
/// writing result JSON to `UNITFLOW_RESULT`, or by printing it as the last
/// line of stdout.
#[derive(Debug, Clone)]
pub struct CommandWorker {
    config: WorkerCommandConfig,
}

impl CommandWorker {
    pub fn new(config: WorkerCommandConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, request: &WorkerRequest) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .current_dir(&request.workspace_path)
            .env("UNITFLOW_DOMAIN", &request.domain)
            .env("UNITFLOW_WORKSPACE", &request.workspace_path)
            .env("UNITFLOW_TASK", &request.task_description)
            .env("UNITFLOW_FILES", request.files.join("\n"))
            .env("UNITFLOW_RESULT", &request.result_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn prepare_result_path(request: &WorkerRequest) -> std::io::Result<()> {
        if let Some(parent) = request.result_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::remove_file(&request.result_path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ExecutionWorker for CommandWorker {
    async fn execute(&self, request: WorkerRequest) -> WorkerResult {
        if let Err(e) = Self::prepare_result_path(&request) {
            return WorkerResult::failed(format!(
                "Failed to prepare result file {}: {}",
                request.result_path.display(),
                e
            ));
        }

        let child = match self.build_command(&request).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(domain = %request.domain, program = %self.config.program, error = %e, "Worker spawn failed");
                return WorkerResult::failed(format!(
                    "Failed to spawn worker '{}': {}",
                    self.config.program, e
                ));
            }
        };
        info!(domain = %request.domain, pid = ?child.id(), workspace = %request.workspace_name, "Worker started");

        // Dropping the timed-out future drops the child, which kills it.
        match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => interpret_output(&request, &output),
            Ok(Err(e)) => WorkerResult::failed(format!("Failed to wait for worker: {}", e)),
            Err(_) => {
                warn!(domain = %request.domain, timeout = ?self.config.timeout, "Worker timed out");
                WorkerResult::failed(format!(
                    "Worker timed out after {}s",
                    self.config.timeout.as_secs_f64()
                ))
            }
        }
    }
}

/// Reads the worker's report from the result file, else from the last
/// stdout line.
fn interpret_output(request: &WorkerRequest, output: &Output) -> WorkerResult {
    if request.result_path.exists() {
        return match std::fs::read_to_string(&request.result_path) {
            Ok(content) => match serde_json::from_str::<WorkerResult>(&content) {
                Ok(result) => {
                    debug!(domain = %request.domain, outcome = %result.outcome, "Read worker result file");
                    result
                }
                Err(e) => WorkerResult::failed(format!("Malformed worker result: {}", e)),
            },
            Err(e) => WorkerResult::failed(format!("Unreadable worker result: {}", e)),
        };
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let last_line = stdout.lines().map(str::trim).rfind(|l| !l.is_empty());
    if let Some(result) = last_line.and_then(|l| serde_json::from_str::<WorkerResult>(l).ok()) {
        return result;
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    let tail = lines
        .iter()
        .skip(lines.len().saturating_sub(STDERR_TAIL_LINES))
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    let mut result = WorkerResult::failed(if output.status.success() {
        "Worker exited without reporting a result".to_string()
    } else {
        format!("Worker exited with {}", output.status)
    });
    if !tail.trim().is_empty() {
        result.issues.push(tail);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::WorkerOutcome;
    use tempfile::TempDir;

    fn sh(script: &str) -> CommandWorker {
        CommandWorker::new(WorkerCommandConfig::new(
            "sh",
            vec!["-c".to_string(), script.to_string()],
        ))
    }

    fn request(dir: &TempDir) -> WorkerRequest {
        let workspace = dir.path().join("ws");
        std::fs::create_dir_all(&workspace).unwrap();
        WorkerRequest {
            unit_id: "UNIT-001".into(),
            domain: "backend".into(),
            workspace_name: "UNIT-001-backend-00000000".into(),
            workspace_path: workspace,
            task_description: "Backend API implementation (2 files)".into(),
            files: vec!["src/api/a.py".into(), "src/api/b.py".into()],
            result_path: dir.path().join(".results").join("backend.json"),
        }
    }

    #[tokio::test]
    async fn reads_result_file_and_sees_environment() {
        let dir = TempDir::new().unwrap();
        let worker = sh(
            r#"printf '{"outcome":"success","files_created":["%s"],"issues":["%s"]}' "$UNITFLOW_DOMAIN" "$(echo "$UNITFLOW_FILES" | wc -l | tr -d ' ')" > "$UNITFLOW_RESULT""#,
        );

        let result = worker.execute(request(&dir)).await;
        assert_eq!(result.outcome, WorkerOutcome::Success);
        assert_eq!(result.files_created, vec!["backend"]);
        assert_eq!(result.issues, vec!["2"]);
    }

    #[tokio::test]
    async fn falls_back_to_last_stdout_line() {
        let dir = TempDir::new().unwrap();
        let worker = sh(r#"echo working; echo '{"outcome":"partial","clarifications":["schema?"]}'"#);

        let result = worker.execute(request(&dir)).await;
        assert_eq!(result.outcome, WorkerOutcome::Partial);
        assert_eq!(result.clarifications, vec!["schema?"]);
    }

    #[tokio::test]
    async fn malformed_result_is_failed() {
        let dir = TempDir::new().unwrap();
        let worker = sh(r#"echo 'not json' > "$UNITFLOW_RESULT""#);

        let result = worker.execute(request(&dir)).await;
        assert_eq!(result.outcome, WorkerOutcome::Failed);
        assert!(result.issues[0].contains("Malformed"), "{:?}", result.issues);
    }

    #[tokio::test]
    async fn nonzero_exit_without_result_is_failed() {
        let dir = TempDir::new().unwrap();
        let worker = sh("echo boom >&2; exit 3");

        let result = worker.execute(request(&dir)).await;
        assert_eq!(result.outcome, WorkerOutcome::Failed);
        assert!(result.issues.iter().any(|i| i.contains("boom")));
    }

    #[tokio::test]
    async fn timeout_is_failed() {
        let dir = TempDir::new().unwrap();
        let worker = CommandWorker::new(
            WorkerCommandConfig::new("sh", vec!["-c".into(), "sleep 5".into()])
                .with_timeout(Duration::from_millis(200)),
        );

        let result = worker.execute(request(&dir)).await;
        assert_eq!(result.outcome, WorkerOutcome::Failed);
        assert!(result.issues[0].contains("timed out"));
    }

    #[tokio::test]
    async fn spawn_failure_is_failed() {
        let dir = TempDir::new().unwrap();
        let worker = CommandWorker::new(WorkerCommandConfig::new(
            "/nonexistent/unitflow-worker",
            Vec::new(),
        ));

        let result = worker.execute(request(&dir)).await;
        assert_eq!(result.outcome, WorkerOutcome::Failed);
        assert!(result.issues[0].contains("spawn"));
    }

    #[tokio::test]
    async fn stale_result_file_is_discarded() {
        let dir = TempDir::new().unwrap();
        let req = request(&dir);
        std::fs::create_dir_all(req.result_path.parent().unwrap()).unwrap();
        std::fs::write(&req.result_path, r#"{"outcome":"success"}"#).unwrap();

        let result = sh("exit 0").execute(req).await;
        assert_eq!(result.outcome, WorkerOutcome::Failed);
    }
}
