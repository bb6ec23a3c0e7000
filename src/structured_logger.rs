//! Per-run JSONL event log.
//!
//! Each line carries a monotonic `seq`, a microsecond UTC timestamp, the run
//! ID and the emitting component, so a run can be replayed from the file.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Structured JSONL logger for one orchestrated run.
pub struct StructuredLogger {
    run_id: String,
    seq: AtomicU64,
    log_file: Mutex<File>,
    log_path: PathBuf,
}

/// A single log entry in JSONL format.
#[derive(Serialize, serde::Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number (unique within a logger)
    pub seq: u64,
    /// ISO 8601 timestamp with microseconds
    pub ts: String,
    /// Run ID
    pub run_id: String,
    /// Component that emitted the log
    pub component: String,
    /// Structured event data
    pub event: Value,
}

impl StructuredLogger {
    /// Creates a new structured logger for the given run.
    ///
    /// Logs are appended to `<logs_dir>/events.jsonl`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The logs directory cannot be created
    /// - The log file cannot be opened
    pub fn new(run_id: &str, logs_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(logs_dir)?;
        let log_path = logs_dir.join("events.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            run_id: run_id.to_string(),
            seq: AtomicU64::new(0),
            log_file: Mutex::new(file),
            log_path,
        })
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Logs a structured event.
    ///
    /// The event is serialized to JSON and written as a single line.
    /// This method is thread-safe.
    pub fn log(&self, component: &str, event: impl Serialize) {
        let entry = LogEntry {
            seq: self.next_seq(),
            ts: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            run_id: self.run_id.clone(),
            component: component.to_string(),
            event: serde_json::to_value(event).unwrap_or(Value::Null),
        };

        if let Ok(mut file) = self.log_file.lock() {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(file, "{}", line);
                let _ = file.flush();
            }
        }
    }

    /// Logs a run phase transition.
    pub fn log_phase_transition(&self, from: &str, to: &str) {
        self.log(
            "Orchestrator",
            serde_json::json!({
                "type": "PhaseTransition",
                "from": from,
                "to": to
            }),
        );
    }

    /// Logs a worker dispatch.
    pub fn log_worker_dispatch(&self, domain: &str, workspace: &str, file_count: usize) {
        self.log(
            "Worker",
            serde_json::json!({
                "type": "Dispatch",
                "domain": domain,
                "workspace": workspace,
                "file_count": file_count
            }),
        );
    }

    /// Logs a worker completion.
    pub fn log_worker_complete(&self, domain: &str, outcome: impl Serialize) {
        self.log(
            "Worker",
            serde_json::json!({
                "type": "Complete",
                "domain": domain,
                "outcome": outcome
            }),
        );
    }

    /// Logs one domain's merge attempt.
    pub fn log_merge_step(&self, step: impl Serialize) {
        self.log(
            "Merge",
            serde_json::json!({
                "type": "MergeStep",
                "step": step
            }),
        );
    }

    /// Logs one validation pass.
    pub fn log_validation_attempt(&self, attempt: impl Serialize) {
        self.log(
            "Validation",
            serde_json::json!({
                "type": "Attempt",
                "attempt": attempt
            }),
        );
    }

    /// Logs the final run status.
    pub fn log_run_complete(&self, unit_id: &str, status: impl Serialize, reason: &str) {
        self.log(
            "Orchestrator",
            serde_json::json!({
                "type": "RunComplete",
                "unit_id": unit_id,
                "status": status,
                "reason": reason
            }),
        );
    }

    /// Path of the JSONL file this logger appends to.
    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

#[cfg(test)]
#[path = "tests/structured_logger_tests.rs"]
mod tests;
