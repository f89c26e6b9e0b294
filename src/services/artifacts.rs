//! Artifact Store
//!
//! Writes everything a campaign leaves on disk besides the checkpoint:
//!
//! - the response tree (`ExecutionResult/Success|Fail/...`), one Markdown
//!   file per assistant exchange with a fixed seven-field header,
//! - the scan tree (`OriginalScanResult/...`), the analyzers' native JSON
//!   reports byte-for-byte,
//! - the vicious-pattern tree (`vicious_pattern/...`), structure-preserving
//!   copies of the elicitor files plus append-only `prompt.txt` lists,
//! - the all-safe lists and the final campaign report.
//!
//! Paths are deterministic: re-running a step overwrites the same file,
//! which keeps crash/resume idempotent.

use std::path::{Path, PathBuf};

use baitline_scanners::FileScanCounts;
use tracing::{info, warn};

use crate::models::report::FinalReport;
use crate::storage::paths::{encode_rel_path, ensure_dir, OutputLayout};
use crate::utils::error::AppResult;

/// Separator between the header block and the body
const HEADER_SEPARATOR_LEN: usize = 50;

/// Vicious-pattern / all-safe tree labels
pub const LABEL_AND: &str = "and_mode";
pub const LABEL_OR_BANDIT: &str = "or_mode/bandit";
pub const LABEL_OR_SEMGREP: &str = "or_mode/semgrep";

/// Identity of one captured assistant exchange
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub project: String,
    pub project_path: PathBuf,
    pub round: u32,
    pub phase: u8,
    pub line: usize,
    pub success: bool,
}

/// Writer for the three output trees
pub struct ArtifactStore {
    layout: OutputLayout,
}

impl ArtifactStore {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Persist one assistant exchange.
    ///
    /// Layout: `ExecutionResult/{Success|Fail}/{project}/round_N/phase_P/line_L.md`
    /// with a seven-field header, a 50-`=` separator, the prompt, and the
    /// raw response.
    pub fn write_response(
        &self,
        meta: &ResponseMeta,
        prompt: &str,
        response: &str,
    ) -> AppResult<PathBuf> {
        let dir = self
            .layout
            .response_dir(meta.success, &meta.project, meta.round, meta.phase);
        ensure_dir(&dir)?;
        let path = dir.join(format!("line_{}.md", meta.line));

        let mut body = String::new();
        body.push_str(&format!(
            "generated_at: {}\n",
            chrono::Utc::now().to_rfc3339()
        ));
        body.push_str(&format!("project: {}\n", meta.project));
        body.push_str(&format!(
            "project_path: {}\n",
            meta.project_path.display()
        ));
        body.push_str(&format!("round: {}\n", meta.round));
        body.push_str(&format!("phase: {}\n", meta.phase));
        body.push_str(&format!("line: {}\n", meta.line));
        body.push_str(&format!(
            "status: {}\n",
            if meta.success { "success" } else { "failed" }
        ));
        body.push_str(&"=".repeat(HEADER_SEPARATOR_LEN));
        body.push_str("\n\n## Prompt\n\n");
        body.push_str(prompt);
        body.push_str("\n\n## Response\n\n");
        body.push_str(response);
        body.push('\n');

        std::fs::write(&path, body)?;
        Ok(path)
    }

    /// Persist one analyzer's native report.
    ///
    /// Layout: `OriginalScanResult/{scanner}/CWE-{id}/{project}/{round_label}/{encoded}_report.json`
    pub fn write_scan_report(
        &self,
        scanner: &str,
        cwe_label: &str,
        project: &str,
        round_label: &str,
        rel_file: &str,
        raw_report: &str,
    ) -> AppResult<PathBuf> {
        let dir = self
            .layout
            .scan_report_dir(scanner, cwe_label, project, round_label);
        ensure_dir(&dir)?;
        let path = dir.join(format!("{}_report.json", encode_rel_path(rel_file)));
        std::fs::write(&path, raw_report)?;
        Ok(path)
    }

    /// Commit a confirmed vicious pattern.
    ///
    /// The file is copied into every mode tree its counts qualify for:
    /// `and_mode` when both scanners fired, the per-scanner OR trees
    /// independently. Each mode directory keeps an append-only,
    /// de-duplicated `prompt.txt` of committed paths. Returns the labels
    /// actually written.
    pub fn commit_vicious(
        &self,
        project_root: &Path,
        project: &str,
        rel_file: &str,
        counts: FileScanCounts,
    ) -> AppResult<Vec<&'static str>> {
        let source = project_root.join(rel_file);
        if !source.exists() {
            warn!(file = rel_file, "vicious pattern source missing, skipping commit");
            return Ok(Vec::new());
        }

        let mut labels = Vec::new();
        if counts.bandit > 0 && counts.semgrep > 0 {
            labels.push(LABEL_AND);
        }
        if counts.bandit > 0 {
            labels.push(LABEL_OR_BANDIT);
        }
        if counts.semgrep > 0 {
            labels.push(LABEL_OR_SEMGREP);
        }

        for label in &labels {
            let mode_dir = self.layout.vicious_pattern_dir(label, project);
            let target = mode_dir.join(rel_file);
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            std::fs::copy(&source, &target)?;
            append_prompt_line(&mode_dir, rel_file)?;
            info!(file = rel_file, mode = label, "committed vicious pattern");
        }
        Ok(labels)
    }

    /// Write one all-safe list. Empty lists produce no file.
    pub fn write_all_safe(
        &self,
        label: &str,
        project: &str,
        files: &[String],
    ) -> AppResult<Option<PathBuf>> {
        if files.is_empty() {
            return Ok(None);
        }
        let dir = self.layout.all_safe_dir(label, project);
        ensure_dir(&dir)?;
        let path = dir.join("prompt.txt");
        std::fs::write(&path, format!("{}\n", files.join("\n")))?;
        info!(label, project, files = files.len(), "wrote all-safe list");
        Ok(Some(path))
    }

    /// Write the final campaign report.
    pub fn write_final_report(&self, report: &FinalReport) -> AppResult<PathBuf> {
        let path = self.layout.final_report_path();
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
        Ok(path)
    }
}

/// Append a path to a mode directory's `prompt.txt` unless already listed.
fn append_prompt_line(mode_dir: &Path, rel_file: &str) -> AppResult<()> {
    ensure_dir(mode_dir)?;
    let prompt_path = mode_dir.join("prompt.txt");
    let existing = std::fs::read_to_string(&prompt_path).unwrap_or_default();
    if existing.lines().any(|l| l.trim() == rel_file) {
        return Ok(());
    }
    let mut updated = existing;
    updated.push_str(rel_file);
    updated.push('\n');
    std::fs::write(&prompt_path, updated)?;
    Ok(())
}
