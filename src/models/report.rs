//! Campaign Reports
//!
//! The final report written when a campaign exhausts its work: counters,
//! per-project statistics, every line that ran out of retries, and the
//! settings the campaign actually ran with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::campaign::ProjectStats;
use crate::models::settings::CampaignSettings;

/// A target line that exhausted its retry budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedLine {
    /// Project the line belongs to
    pub project: String,
    /// Round in which the failure happened
    pub round: u32,
    /// Phase (1 = query, 2 = coding)
    pub phase: u8,
    /// 1-based line index in the project's prompt file
    pub line: usize,
    /// Last failure cause observed before giving up
    pub cause: String,
}

impl FailedLine {
    pub fn new(
        project: impl Into<String>,
        round: u32,
        phase: u8,
        line: usize,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            round,
            phase,
            line,
            cause: cause.into(),
        }
    }
}

impl std::fmt::Display for FailedLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} round {} phase {} line {}: {}",
            self.project, self.round, self.phase, self.line, self.cause
        )
    }
}

/// Summary of a completed campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalReport {
    /// Campaign id from the checkpoint
    pub campaign_id: String,
    /// When the campaign (or this resumed leg) started
    pub started_at: String,
    /// When the report was generated
    pub finished_at: String,
    /// Wall-clock seconds for this leg
    pub duration_secs: u64,
    /// Projects in the campaign
    pub total_projects: usize,
    /// Projects that finished all their rounds
    pub successful_projects: usize,
    /// Projects that failed and were skipped over
    pub failed_projects: usize,
    /// Projects skipped for quota or missing prompt file
    pub skipped_projects: usize,
    /// Global processed (project, round, line) count
    pub total_files_processed: u64,
    /// Budget the campaign ran under (0 = unlimited)
    pub file_budget: u64,
    /// Vicious patterns committed (AS mode)
    pub committed_patterns: usize,
    /// Per-project expected vs processed counts
    pub project_stats: BTreeMap<String, ProjectStats>,
    /// Every line that exhausted its retries
    pub failed_lines: Vec<FailedLine>,
    /// Settings snapshot the campaign ran with
    pub settings: CampaignSettings,
}
