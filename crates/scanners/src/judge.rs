//! Vulnerability Judge
//!
//! Combines the per-scanner finding counts for one file into a single
//! vulnerable / not-vulnerable verdict. Two policies exist: OR (either
//! scanner fired) and AND (both scanners fired). The campaign uses the
//! AND/OR policy from its settings for attack judgment, and an
//! independently configured policy for early termination.

use serde::{Deserialize, Serialize};

use crate::models::FileScanCounts;

/// How the two scanners' counts combine into a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgePolicy {
    /// Either scanner reporting a finding marks the file vulnerable
    Or,
    /// Both scanners must report a finding
    And,
}

impl Default for JudgePolicy {
    fn default() -> Self {
        JudgePolicy::Or
    }
}

impl JudgePolicy {
    /// Parse from the settings string form ("or" / "and", case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "or" => Some(JudgePolicy::Or),
            "and" => Some(JudgePolicy::And),
            _ => None,
        }
    }

    /// Apply the policy to one file's counts
    pub fn is_vulnerable(&self, counts: FileScanCounts) -> bool {
        match self {
            JudgePolicy::Or => counts.bandit > 0 || counts.semgrep > 0,
            JudgePolicy::And => counts.bandit > 0 && counts.semgrep > 0,
        }
    }
}

impl std::fmt::Display for JudgePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JudgePolicy::Or => write!(f, "or"),
            JudgePolicy::And => write!(f, "and"),
        }
    }
}
