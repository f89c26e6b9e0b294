//! Scanner Invocation
//!
//! Runs the external analyzers as subprocesses and turns their native JSON
//! reports into `ScanOutcome`s. Both scanners for a single file may run
//! concurrently (`ScannerPair::scan_both`); the caller waits for both
//! before consulting the judge.
//!
//! Analyzer exit codes are not trusted: Bandit exits non-zero whenever it
//! has findings. An invocation is successful iff its stdout parses as a
//! JSON document; anything else is a scanner failure that contributes zero
//! findings and is logged, never retried.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use baitline_core::CancellationToken;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::models::{Finding, ScanOutcome, ScannerKind};

/// Default per-invocation timeout (seconds)
const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 300;

/// Cap on the captured native report size
const MAX_REPORT_BYTES: usize = 4 * 1024 * 1024;

/// One named analyzer that can scan a single file for a CWE
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Which analyzer this is
    fn kind(&self) -> ScannerKind;

    /// Scan `target` for `cwe_id`, returning the outcome. Never errors:
    /// operational failures are encoded in the outcome status.
    async fn scan(&self, target: &Path, cwe_id: &str, cancel: &CancellationToken) -> ScanOutcome;
}

/// Subprocess-backed scanner.
///
/// Arguments are built from a template; `{file}` is replaced with the
/// target path and `{cwe}` with the zero-padded CWE number, so deployments
/// can pin analyzer rule packs per weakness class.
pub struct CommandScanner {
    kind: ScannerKind,
    command: String,
    args_template: Vec<String>,
    timeout_secs: u64,
}

impl CommandScanner {
    /// Create a scanner with the default command and argument template for
    /// its kind.
    pub fn new(kind: ScannerKind) -> Self {
        let args_template = match kind {
            ScannerKind::Bandit => vec![
                "-f".to_string(),
                "json".to_string(),
                "-q".to_string(),
                "{file}".to_string(),
            ],
            ScannerKind::Semgrep => vec![
                "scan".to_string(),
                "--json".to_string(),
                "--quiet".to_string(),
                "--config".to_string(),
                "p/security-audit".to_string(),
                "{file}".to_string(),
            ],
        };
        Self {
            kind,
            command: kind.default_command().to_string(),
            args_template,
            timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
        }
    }

    /// Override the executable (e.g., a wrapper script)
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Override the argument template
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args_template = args;
        self
    }

    /// Override the per-invocation timeout
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Materialize the argument template for one target
    fn build_args(&self, target: &Path, cwe_id: &str) -> Vec<String> {
        let file = target.to_string_lossy();
        self.args_template
            .iter()
            .map(|a| a.replace("{file}", &file).replace("{cwe}", cwe_id))
            .collect()
    }

    /// Check whether the analyzer executable exists on PATH
    async fn command_exists(&self) -> bool {
        #[cfg(windows)]
        let probe = "where";
        #[cfg(not(windows))]
        let probe = "which";

        Command::new(probe)
            .arg(&self.command)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Scanner for CommandScanner {
    fn kind(&self) -> ScannerKind {
        self.kind
    }

    async fn scan(&self, target: &Path, cwe_id: &str, cancel: &CancellationToken) -> ScanOutcome {
        if !self.command_exists().await {
            warn!(scanner = %self.kind, command = %self.command, "analyzer not found in PATH");
            return ScanOutcome::tool_missing(self.kind);
        }

        let args = self.build_args(target, cwe_id);
        debug!(scanner = %self.kind, ?args, "invoking analyzer");

        let start = Instant::now();
        let mut cmd = Command::new(&self.command);
        cmd.args(&args).stdout(Stdio::piped()).stderr(Stdio::piped());

        let run = timeout(Duration::from_secs(self.timeout_secs), cmd.output());
        let output = tokio::select! {
            _ = cancel.cancelled() => {
                return ScanOutcome::failed(self.kind, String::new(), "scan cancelled");
            }
            result = run => result,
        };

        match output {
            Ok(Ok(output)) => {
                let raw = truncate_report(&output.stdout);
                let duration_ms = start.elapsed().as_millis() as u64;

                match parse_native_report(self.kind, &raw) {
                    Some(findings) => {
                        debug!(
                            scanner = %self.kind,
                            findings = findings.len(),
                            duration_ms,
                            "analyzer completed"
                        );
                        ScanOutcome::success(self.kind, findings, raw, duration_ms)
                    }
                    None => {
                        let stderr = String::from_utf8_lossy(&output.stderr);
                        warn!(scanner = %self.kind, %stderr, "analyzer produced unparsable report");
                        ScanOutcome::failed(
                            self.kind,
                            raw,
                            format!("unparsable report: {}", stderr.trim()),
                        )
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(scanner = %self.kind, error = %e, "analyzer failed to start");
                ScanOutcome::failed(self.kind, String::new(), format!("failed to execute: {}", e))
            }
            Err(_) => {
                warn!(scanner = %self.kind, timeout_secs = self.timeout_secs, "analyzer timed out");
                ScanOutcome::timed_out(self.kind, self.timeout_secs)
            }
        }
    }
}

/// The two analyzers a campaign drives, scanned concurrently per file
pub struct ScannerPair {
    bandit: Arc<dyn Scanner>,
    semgrep: Arc<dyn Scanner>,
}

impl ScannerPair {
    /// Pair up two scanner implementations
    pub fn new(bandit: Arc<dyn Scanner>, semgrep: Arc<dyn Scanner>) -> Self {
        Self { bandit, semgrep }
    }

    /// Default subprocess-backed pair
    pub fn command_backed(timeout_secs: u64) -> Self {
        Self::new(
            Arc::new(CommandScanner::new(ScannerKind::Bandit).with_timeout_secs(timeout_secs)),
            Arc::new(CommandScanner::new(ScannerKind::Semgrep).with_timeout_secs(timeout_secs)),
        )
    }

    /// Run both analyzers against one file concurrently. Returns
    /// `(bandit, semgrep)` outcomes; the judge input is derived from both.
    pub async fn scan_both(
        &self,
        target: &Path,
        cwe_id: &str,
        cancel: &CancellationToken,
    ) -> (ScanOutcome, ScanOutcome) {
        futures_util::future::join(
            self.bandit.scan(target, cwe_id, cancel),
            self.semgrep.scan(target, cwe_id, cancel),
        )
        .await
    }
}

/// Cap the captured report, marking the truncation
fn truncate_report(bytes: &[u8]) -> String {
    let s = String::from_utf8_lossy(bytes);
    if s.len() > MAX_REPORT_BYTES {
        format!("{}\n... (report truncated)", &s[..MAX_REPORT_BYTES])
    } else {
        s.into_owned()
    }
}

/// Parse an analyzer's native JSON report into findings.
///
/// Returns `None` when the report is not a JSON document. An empty or
/// unexpected `results` array parses as zero findings.
fn parse_native_report(kind: ScannerKind, raw: &str) -> Option<Vec<Finding>> {
    let doc: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
    let results = match doc.get("results").and_then(|r| r.as_array()) {
        Some(results) => results.clone(),
        None => Vec::new(),
    };

    let findings = results
        .iter()
        .filter_map(|entry| match kind {
            ScannerKind::Bandit => parse_bandit_result(entry),
            ScannerKind::Semgrep => parse_semgrep_result(entry),
        })
        .collect();

    Some(findings)
}

/// One entry of Bandit's `results` array
fn parse_bandit_result(entry: &serde_json::Value) -> Option<Finding> {
    let file_path = entry.get("filename")?.as_str()?.to_string();
    let line_start = entry.get("line_number").and_then(|l| l.as_i64()).unwrap_or(0);
    Some(Finding {
        file_path,
        line_start,
        scanner: ScannerKind::Bandit,
        rule_id: entry
            .get("test_id")
            .and_then(|t| t.as_str())
            .map(str::to_string),
        message: entry
            .get("issue_text")
            .and_then(|t| t.as_str())
            .map(str::to_string),
    })
}

/// One entry of Semgrep's `results` array
fn parse_semgrep_result(entry: &serde_json::Value) -> Option<Finding> {
    let file_path = entry.get("path")?.as_str()?.to_string();
    let line_start = entry
        .get("start")
        .and_then(|s| s.get("line"))
        .and_then(|l| l.as_i64())
        .unwrap_or(0);
    Some(Finding {
        file_path,
        line_start,
        scanner: ScannerKind::Semgrep,
        rule_id: entry
            .get("check_id")
            .and_then(|c| c.as_str())
            .map(str::to_string),
        message: entry
            .get("extra")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string),
    })
}
