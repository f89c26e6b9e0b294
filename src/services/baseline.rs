//! Baseline Scanner
//!
//! Scans every target file of a project in its unmodified state before the
//! first attack round, establishing the pre-existing vulnerability picture
//! for later differential analysis. Runs at most once per (campaign,
//! project): completion is recorded in the checkpoint and survives resume.

use std::sync::Arc;

use baitline_core::CancellationToken;
use baitline_scanners::ScannerPair;
use tracing::{info, warn};

use crate::models::campaign::ProjectInfo;
use crate::services::artifacts::ArtifactStore;
use crate::storage::checkpoint::{CheckpointStore, ProgressUpdate};
use crate::utils::error::{AppError, AppResult};

/// Round label of the pre-attack scan slot
pub const BASELINE_LABEL: &str = "baseline";

/// One-shot pre-attack scanner
pub struct BaselineScanner {
    scanners: Arc<ScannerPair>,
    artifacts: Arc<ArtifactStore>,
}

impl BaselineScanner {
    pub fn new(scanners: Arc<ScannerPair>, artifacts: Arc<ArtifactStore>) -> Self {
        Self { scanners, artifacts }
    }

    /// Scan the project's target files in their original state.
    ///
    /// No-op when the checkpoint already records the project as baseline
    /// complete. Missing target files are logged and skipped; they do not
    /// prevent completion. The completion mark is written only after every
    /// file was scanned.
    pub async fn run(
        &self,
        project: &ProjectInfo,
        prompt_lines: &[String],
        cwe_id: &str,
        cwe_label: &str,
        checkpoint: &mut CheckpointStore,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        if checkpoint.is_baseline_completed(&project.name) {
            info!(project = %project.name, "baseline scan already completed, skipping");
            return Ok(());
        }

        info!(
            project = %project.name,
            files = prompt_lines.len(),
            "running pre-attack baseline scan"
        );

        for rel_file in prompt_lines {
            if cancel.is_cancelled() {
                return Err(AppError::Interrupted);
            }

            let full_path = project.path.join(rel_file);
            if !full_path.exists() {
                warn!(file = %rel_file, "target file missing, skipping baseline scan");
                continue;
            }

            let (bandit, semgrep) = self.scanners.scan_both(&full_path, cwe_id, cancel).await;
            if cancel.is_cancelled() {
                return Err(AppError::Interrupted);
            }

            self.artifacts.write_scan_report(
                bandit.scanner.name(),
                cwe_label,
                &project.name,
                BASELINE_LABEL,
                rel_file,
                &bandit.raw_report,
            )?;
            self.artifacts.write_scan_report(
                semgrep.scanner.name(),
                cwe_label,
                &project.name,
                BASELINE_LABEL,
                rel_file,
                &semgrep.raw_report,
            )?;
        }

        checkpoint.update_progress(ProgressUpdate::new().baseline_completed(&project.name))?;
        info!(project = %project.name, "baseline scan complete");
        Ok(())
    }
}
