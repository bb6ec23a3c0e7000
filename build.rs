//! Stamps the git revision into the binary and enforces a few source rules
//! over `src/` that clippy cannot express.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Files allowed to spawn `git` directly; everything else goes through `git.rs`.
const GIT_PLUMBING: &[&str] = &["src/git.rs", "src/test_support.rs"];

/// Phrases that mark a test quietly passing without exercising anything.
const SKIP_PHRASES: &[&str] = &["Skipping test", "skipping test", "git not available"];

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=src");

    let sha = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=UNITFLOW_GIT_SHA={}", sha);

    let root = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()));
    let mut sources = Vec::new();
    collect_rust_files(&root.join("src"), &mut sources);

    let mut violations = Vec::new();
    for file in &sources {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        let rel = file
            .strip_prefix(&root)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/");
        check_source(&rel, &content, &mut violations);
    }

    if !violations.is_empty() {
        eprintln!("\nunitflow source rules violated:");
        for v in &violations {
            eprintln!("  {}", v);
        }
        eprintln!();
        panic!("Build failed: {} source rule violation(s)", violations.len());
    }
}

fn collect_rust_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        if path.is_dir() {
            collect_rust_files(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
}

fn check_source(rel: &str, content: &str, violations: &mut Vec<String>) {
    let git_allowed = GIT_PLUMBING.contains(&rel);
    let mut serial_attr = false;
    let mut in_serial_fn = false;

    for (idx, line) in content.lines().enumerate() {
        let at = format!("{}:{}", rel, idx + 1);
        let trimmed = line.trim();
        if trimmed.starts_with("//") {
            continue;
        }

        if (trimmed.starts_with("#[allow(") || trimmed.starts_with("#![allow("))
            && trimmed.contains("dead_code")
        {
            violations.push(format!("{} allow(dead_code); delete the unused code instead", at));
        }

        if !git_allowed && trimmed.contains("Command::new(\"git\")") {
            violations.push(format!("{} spawns git directly; use crate::git", at));
        }

        if let Some(phrase) = SKIP_PHRASES.iter().find(|p| trimmed.contains(**p)) {
            violations.push(format!("{} test skips itself ({}); fail instead", at, phrase));
        }

        if trimmed.starts_with("#[serial") {
            serial_attr = true;
        } else if is_fn_signature(trimmed) {
            in_serial_fn = serial_attr;
            serial_attr = false;
        }
        if !in_serial_fn && (trimmed.contains("env::set_var") || trimmed.contains("env::remove_var")) {
            violations.push(format!("{} mutates the environment outside a #[serial] test", at));
        }
    }
}

fn is_fn_signature(line: &str) -> bool {
    ["fn ", "async fn ", "pub fn ", "pub async fn ", "pub(crate) fn "]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}
