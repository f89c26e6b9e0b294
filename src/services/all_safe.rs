//! All-Safe Aggregation
//!
//! RAW-mode post-pass. After all rounds of a project, sweep every persisted
//! scan report - baseline included - and synthesize the lists of target
//! files that never triggered a finding:
//!
//! - `and_mode`: neither scanner ever fired,
//! - `or_mode/bandit`: Bandit never fired,
//! - `or_mode/semgrep`: Semgrep never fired.
//!
//! The sweep reads the native reports from disk rather than trusting
//! in-memory state, so it also covers rounds executed before a resume.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::services::artifacts::{ArtifactStore, LABEL_AND, LABEL_OR_BANDIT, LABEL_OR_SEMGREP};
use crate::storage::paths::OutputLayout;
use crate::utils::error::AppResult;

/// Per-file flag pair accumulated over the sweep
#[derive(Debug, Clone, Copy, Default)]
struct FoundFlags {
    bandit: bool,
    semgrep: bool,
}

/// Sizes of the three generated lists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllSafeSummary {
    pub and_mode: Vec<String>,
    pub or_mode_bandit: Vec<String>,
    pub or_mode_semgrep: Vec<String>,
}

/// The aggregation pass over one project's report tree
pub struct AllSafeAggregator {
    layout: OutputLayout,
    artifacts: Arc<ArtifactStore>,
}

impl AllSafeAggregator {
    pub fn new(layout: OutputLayout, artifacts: Arc<ArtifactStore>) -> Self {
        Self { layout, artifacts }
    }

    /// Aggregate all rounds (and the baseline slot) of one project and
    /// write the non-empty safe lists.
    pub fn run(
        &self,
        project: &str,
        cwe_label: &str,
        total_rounds: u32,
        prompt_lines: &[String],
    ) -> AppResult<AllSafeSummary> {
        info!(project, cwe = cwe_label, "aggregating all-safe lists");

        let mut flags: BTreeMap<String, FoundFlags> = prompt_lines
            .iter()
            .map(|line| (line.clone(), FoundFlags::default()))
            .collect();

        let mut labels = vec!["baseline".to_string()];
        labels.extend((1..=total_rounds).map(|r| format!("round_{}", r)));

        for label in &labels {
            self.sweep_reports("bandit", cwe_label, project, label, &mut flags, true)?;
            self.sweep_reports("semgrep", cwe_label, project, label, &mut flags, false)?;
        }

        let summary = AllSafeSummary {
            and_mode: flags
                .iter()
                .filter(|(_, f)| !f.bandit && !f.semgrep)
                .map(|(k, _)| k.clone())
                .collect(),
            or_mode_bandit: flags
                .iter()
                .filter(|(_, f)| !f.bandit)
                .map(|(k, _)| k.clone())
                .collect(),
            or_mode_semgrep: flags
                .iter()
                .filter(|(_, f)| !f.semgrep)
                .map(|(k, _)| k.clone())
                .collect(),
        };

        info!(
            and = summary.and_mode.len(),
            or_bandit = summary.or_mode_bandit.len(),
            or_semgrep = summary.or_mode_semgrep.len(),
            total = flags.len(),
            "all-safe classification done"
        );

        self.artifacts
            .write_all_safe(LABEL_AND, project, &summary.and_mode)?;
        self.artifacts
            .write_all_safe(LABEL_OR_BANDIT, project, &summary.or_mode_bandit)?;
        self.artifacts
            .write_all_safe(LABEL_OR_SEMGREP, project, &summary.or_mode_semgrep)?;

        Ok(summary)
    }

    /// Read every report of one (scanner, round) slot and flag the target
    /// files its results name.
    fn sweep_reports(
        &self,
        scanner: &str,
        cwe_label: &str,
        project: &str,
        round_label: &str,
        flags: &mut BTreeMap<String, FoundFlags>,
        is_bandit: bool,
    ) -> AppResult<()> {
        let dir = self
            .layout
            .scan_report_dir(scanner, cwe_label, project, round_label);
        if !dir.exists() {
            return Ok(());
        }

        let pattern = dir.join("*_report.json");
        let entries = match glob::glob(&pattern.to_string_lossy()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "bad report glob pattern");
                return Ok(());
            }
        };

        for entry in entries.flatten() {
            mark_found_files(&entry, flags, is_bandit);
        }
        Ok(())
    }
}

/// Flag every tracked file a report's results mention.
fn mark_found_files(report_path: &Path, flags: &mut BTreeMap<String, FoundFlags>, is_bandit: bool) {
    let text = match std::fs::read_to_string(report_path) {
        Ok(text) => text,
        Err(e) => {
            debug!(report = %report_path.display(), error = %e, "unreadable report");
            return;
        }
    };
    let doc: serde_json::Value = match serde_json::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(report = %report_path.display(), error = %e, "unparsable report");
            return;
        }
    };

    let Some(results) = doc.get("results").and_then(|r| r.as_array()) else {
        return;
    };
    if results.is_empty() {
        return;
    }

    let path_key = if is_bandit { "filename" } else { "path" };
    for (target, entry_flags) in flags.iter_mut() {
        let named = results.iter().any(|result| {
            result
                .get(path_key)
                .and_then(|p| p.as_str())
                .map(|p| p.contains(target.as_str()) || p.ends_with(target.as_str()))
                .unwrap_or(false)
        });
        if named {
            if is_bandit {
                entry_flags.bandit = true;
            } else {
                entry_flags.semgrep = true;
            }
        }
    }
}
