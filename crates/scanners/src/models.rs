//! Scanner Models
//!
//! Data structures describing one analyzer invocation against one file:
//! which scanner ran, whether it ran cleanly, the findings it reported, and
//! the native report body that gets persisted unmodified.

use serde::{Deserialize, Serialize};

/// The two static analyzers driven by a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    /// Bandit (Python AST-based analyzer)
    Bandit,
    /// Semgrep (pattern-based analyzer)
    Semgrep,
}

impl ScannerKind {
    /// Stable lowercase name, used for directory layout and settings
    pub fn name(&self) -> &'static str {
        match self {
            ScannerKind::Bandit => "bandit",
            ScannerKind::Semgrep => "semgrep",
        }
    }

    /// Default executable name on PATH
    pub fn default_command(&self) -> &'static str {
        self.name()
    }
}

impl std::fmt::Display for ScannerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How an analyzer invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// The analyzer ran and produced a parsable report
    Success,
    /// The analyzer crashed or produced unparsable output
    Failed,
    /// The analyzer exceeded its invocation timeout
    Timeout,
    /// The analyzer executable was not found on PATH
    ToolMissing,
}

impl ScanStatus {
    /// Whether findings from this invocation may be counted
    pub fn is_success(&self) -> bool {
        matches!(self, ScanStatus::Success)
    }
}

/// A single finding reported by an analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Path of the file the finding is located in, as reported
    pub file_path: String,
    /// First line of the flagged range (1-based; 0 when unknown)
    pub line_start: i64,
    /// Scanner that produced the finding
    pub scanner: ScannerKind,
    /// Analyzer-specific rule identifier (test_id / check_id)
    pub rule_id: Option<String>,
    /// Analyzer-provided message text
    pub message: Option<String>,
}

impl Finding {
    /// A finding counts only when it carries a real location
    pub fn is_countable(&self) -> bool {
        self.line_start > 0
    }
}

/// Result of one analyzer invocation against one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Scanner that ran
    pub scanner: ScannerKind,
    /// How the invocation ended
    pub status: ScanStatus,
    /// Parsed findings (may be non-empty even on partial reports)
    pub findings: Vec<Finding>,
    /// The analyzer's native JSON report, byte-for-byte
    pub raw_report: String,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Error description for failed/timeout/missing invocations
    pub error: Option<String>,
}

impl ScanOutcome {
    /// Successful outcome carrying parsed findings and the native report
    pub fn success(scanner: ScannerKind, findings: Vec<Finding>, raw_report: String, duration_ms: u64) -> Self {
        Self {
            scanner,
            status: ScanStatus::Success,
            findings,
            raw_report,
            duration_ms,
            error: None,
        }
    }

    /// Failed outcome; the raw report is kept when the process produced one
    pub fn failed(scanner: ScannerKind, raw_report: String, error: impl Into<String>) -> Self {
        Self {
            scanner,
            status: ScanStatus::Failed,
            findings: Vec::new(),
            raw_report,
            duration_ms: 0,
            error: Some(error.into()),
        }
    }

    /// Timed-out outcome
    pub fn timed_out(scanner: ScannerKind, timeout_secs: u64) -> Self {
        Self {
            scanner,
            status: ScanStatus::Timeout,
            findings: Vec::new(),
            raw_report: String::new(),
            duration_ms: timeout_secs * 1000,
            error: Some(format!("scan timed out after {} seconds", timeout_secs)),
        }
    }

    /// Outcome for a missing analyzer executable
    pub fn tool_missing(scanner: ScannerKind) -> Self {
        Self {
            scanner,
            status: ScanStatus::ToolMissing,
            findings: Vec::new(),
            raw_report: String::new(),
            duration_ms: 0,
            error: Some(format!("'{}' not found in PATH", scanner.default_command())),
        }
    }

    /// Number of findings that count toward the judge.
    ///
    /// A finding counts only when the invocation succeeded and the finding
    /// carries a positive start line.
    pub fn finding_count(&self) -> usize {
        if !self.status.is_success() {
            return 0;
        }
        self.findings.iter().filter(|f| f.is_countable()).count()
    }
}

/// Per-file counts from both scanners, the judge's input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileScanCounts {
    /// Countable Bandit findings
    pub bandit: usize,
    /// Countable Semgrep findings
    pub semgrep: usize,
}

impl FileScanCounts {
    /// Build counts from the two outcomes of one file scan
    pub fn from_outcomes(bandit: &ScanOutcome, semgrep: &ScanOutcome) -> Self {
        Self {
            bandit: bandit.finding_count(),
            semgrep: semgrep.finding_count(),
        }
    }

    /// Combined finding count
    pub fn total(&self) -> usize {
        self.bandit + self.semgrep
    }

    /// Whether either scanner reported anything at all
    pub fn any(&self) -> bool {
        self.total() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(scanner: ScannerKind, line: i64) -> Finding {
        Finding {
            file_path: "src/app.py".to_string(),
            line_start: line,
            scanner,
            rule_id: Some("B108".to_string()),
            message: None,
        }
    }

    #[test]
    fn test_scanner_kind_names() {
        assert_eq!(ScannerKind::Bandit.name(), "bandit");
        assert_eq!(ScannerKind::Semgrep.to_string(), "semgrep");
    }

    #[test]
    fn test_finding_countable_requires_location() {
        assert!(finding(ScannerKind::Bandit, 12).is_countable());
        assert!(!finding(ScannerKind::Bandit, 0).is_countable());
        assert!(!finding(ScannerKind::Bandit, -1).is_countable());
    }

    #[test]
    fn test_finding_count_only_on_success() {
        let ok = ScanOutcome::success(
            ScannerKind::Bandit,
            vec![finding(ScannerKind::Bandit, 3), finding(ScannerKind::Bandit, 0)],
            "{}".to_string(),
            5,
        );
        assert_eq!(ok.finding_count(), 1);

        let failed = ScanOutcome::failed(ScannerKind::Bandit, String::new(), "crashed");
        assert_eq!(failed.finding_count(), 0);

        let timeout = ScanOutcome::timed_out(ScannerKind::Semgrep, 300);
        assert_eq!(timeout.finding_count(), 0);
        assert_eq!(timeout.duration_ms, 300_000);
    }

    #[test]
    fn test_counts_from_outcomes() {
        let bandit = ScanOutcome::success(
            ScannerKind::Bandit,
            vec![finding(ScannerKind::Bandit, 3)],
            "{}".to_string(),
            2,
        );
        let semgrep = ScanOutcome::tool_missing(ScannerKind::Semgrep);
        let counts = FileScanCounts::from_outcomes(&bandit, &semgrep);
        assert_eq!(counts.bandit, 1);
        assert_eq!(counts.semgrep, 0);
        assert_eq!(counts.total(), 1);
        assert!(counts.any());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ScanOutcome::success(
            ScannerKind::Semgrep,
            vec![finding(ScannerKind::Semgrep, 9)],
            "{\"results\":[]}".to_string(),
            17,
        );
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"scanner\":\"semgrep\""));
        assert!(json.contains("\"status\":\"success\""));
        let parsed: ScanOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.finding_count(), 1);
    }
}
