//! Campaign Settings
//!
//! The typed settings record for a campaign. All knobs are enumerated here;
//! unknown keys in a settings document are rejected at parse time. The
//! record is snapshotted into the checkpoint at campaign creation and never
//! mutated afterwards - resuming a campaign reuses the snapshot verbatim.

use std::path::{Path, PathBuf};

use baitline_scanners::JudgePolicy;
use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

/// Campaign execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Artificial-suicide mode: two-phase attack rounds with bait-code
    /// verification and vicious-pattern commits
    #[serde(rename = "AS")]
    As,
    /// Raw mode: the same round loop without bait-code testing, with
    /// optional early termination and all-safe aggregation
    #[serde(rename = "RAW")]
    Raw,
}

impl Mode {
    /// Whether bait-code testing and vicious-pattern commits apply
    pub fn is_as(&self) -> bool {
        matches!(self, Mode::As)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::As => write!(f, "AS"),
            Mode::Raw => write!(f, "RAW"),
        }
    }
}

fn default_judge_policy() -> JudgePolicy {
    JudgePolicy::Or
}

fn default_bait_rounds() -> u32 {
    3
}

fn default_smart_wait() -> bool {
    true
}

fn default_max_retries() -> u32 {
    10
}

/// Full settings record for one campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignSettings {
    /// Execution mode
    pub mode: Mode,
    /// Zero-padded numeric CWE id, e.g. "022"
    pub cwe_id: String,
    /// Number of attack rounds per project
    pub total_rounds: u32,
    /// Global cap on processed (project, round, line) units; 0 = unlimited
    #[serde(default)]
    pub file_budget: u64,
    /// Attack judgment policy (AS mode)
    #[serde(default = "default_judge_policy")]
    pub judge_policy: JudgePolicy,
    /// Verification attempts per pending pattern (AS mode)
    #[serde(default = "default_bait_rounds")]
    pub bait_code_test_rounds: u32,
    /// Stop attacking a line once it judged vulnerable (RAW mode)
    #[serde(default)]
    pub early_termination_enabled: bool,
    /// Policy feeding early termination (RAW mode)
    #[serde(default = "default_judge_policy")]
    pub early_termination_policy: JudgePolicy,
    /// Aggregate never-flagged files after the campaign (RAW mode)
    #[serde(default)]
    pub all_safe_enabled: bool,
    /// Use the stability-window wait for assistant responses
    #[serde(default = "default_smart_wait")]
    pub smart_wait: bool,
    /// Retry budget per target line (0-based counter compared against this)
    #[serde(default = "default_max_retries")]
    pub max_retries_per_line: u32,
    /// Absolute paths of the target projects
    pub project_roots: Vec<PathBuf>,
}

impl CampaignSettings {
    /// Load and validate a settings document from a JSON file.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("cannot read settings file {}: {}", path.display(), e))
        })?;
        let settings: CampaignSettings = serde_json::from_str(&text)
            .map_err(|e| AppError::config(format!("invalid settings document: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate field constraints that serde cannot express.
    pub fn validate(&self) -> AppResult<()> {
        if self.cwe_id.is_empty() || !self.cwe_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::config(format!(
                "cwe_id must be a numeric string, got '{}'",
                self.cwe_id
            )));
        }
        if self.total_rounds == 0 {
            return Err(AppError::config("total_rounds must be positive"));
        }
        if self.bait_code_test_rounds == 0 {
            return Err(AppError::config("bait_code_test_rounds must be positive"));
        }
        if self.max_retries_per_line == 0 {
            return Err(AppError::config("max_retries_per_line must be positive"));
        }
        if self.project_roots.is_empty() {
            return Err(AppError::config("project_roots must not be empty"));
        }
        Ok(())
    }

    /// Display label, e.g. "CWE-022"
    pub fn cwe_label(&self) -> String {
        format!("CWE-{}", self.cwe_id)
    }

    /// Whether the budget still has room given a processed count
    pub fn within_budget(&self, processed: u64) -> bool {
        self.file_budget == 0 || processed < self.file_budget
    }

    /// Remaining budget units; `u64::MAX` when unlimited
    pub fn remaining_budget(&self, processed: u64) -> u64 {
        if self.file_budget == 0 {
            u64::MAX
        } else {
            self.file_budget.saturating_sub(processed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> CampaignSettings {
        CampaignSettings {
            mode: Mode::As,
            cwe_id: "022".to_string(),
            total_rounds: 3,
            file_budget: 0,
            judge_policy: JudgePolicy::Or,
            bait_code_test_rounds: 3,
            early_termination_enabled: false,
            early_termination_policy: JudgePolicy::Or,
            all_safe_enabled: false,
            smart_wait: true,
            max_retries_per_line: 10,
            project_roots: vec![PathBuf::from("/projects/sample")],
        }
    }

    #[test]
    fn test_mode_serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&Mode::As).unwrap(), "\"AS\"");
        assert_eq!(serde_json::to_string(&Mode::Raw).unwrap(), "\"RAW\"");
        let parsed: Mode = serde_json::from_str("\"RAW\"").unwrap();
        assert_eq!(parsed, Mode::Raw);
    }

    #[test]
    fn test_defaults_applied() {
        let json = r#"{
            "mode": "RAW",
            "cwe_id": "078",
            "total_rounds": 2,
            "project_roots": ["/p/a"]
        }"#;
        let settings: CampaignSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.file_budget, 0);
        assert_eq!(settings.bait_code_test_rounds, 3);
        assert_eq!(settings.max_retries_per_line, 10);
        assert!(settings.smart_wait);
        assert!(!settings.early_termination_enabled);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let json = r#"{
            "mode": "RAW",
            "cwe_id": "078",
            "total_rounds": 2,
            "project_roots": ["/p/a"],
            "definitely_not_a_setting": true
        }"#;
        let result: Result<CampaignSettings, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_non_numeric_cwe() {
        let mut settings = base_settings();
        settings.cwe_id = "CWE-022".to_string();
        assert!(settings.validate().is_err());
        settings.cwe_id = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_rounds() {
        let mut settings = base_settings();
        settings.total_rounds = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_projects() {
        let mut settings = base_settings();
        settings.project_roots.clear();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_cwe_label() {
        assert_eq!(base_settings().cwe_label(), "CWE-022");
    }

    #[test]
    fn test_budget_helpers() {
        let mut settings = base_settings();
        assert!(settings.within_budget(1_000_000));
        assert_eq!(settings.remaining_budget(42), u64::MAX);

        settings.file_budget = 7;
        assert!(settings.within_budget(6));
        assert!(!settings.within_budget(7));
        assert_eq!(settings.remaining_budget(5), 2);
        assert_eq!(settings.remaining_budget(9), 0);
    }

    #[test]
    fn test_settings_round_trip() {
        let settings = base_settings();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: CampaignSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }
}
