//! Output Layout
//!
//! Resolves every on-disk location the campaign writes to. The directory
//! names are external contract - downstream tooling consumes the response,
//! scan and vicious-pattern trees by path - so they are fixed here and
//! parameterized only by the output base directory.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Response tree root, relative to the output base
const EXECUTION_RESULT_DIR: &str = "ExecutionResult";
/// Scan tree root, relative to the output base
const ORIGINAL_SCAN_RESULT_DIR: &str = "OriginalScanResult";
/// Vicious-pattern tree root, relative to the output base
const VICIOUS_PATTERN_DIR: &str = "vicious_pattern";
/// Checkpoint document name
const CHECKPOINT_FILE: &str = "checkpoint.json";

/// All output locations of one campaign
#[derive(Debug, Clone)]
pub struct OutputLayout {
    base: PathBuf,
}

impl OutputLayout {
    /// Layout rooted at an explicit output directory
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Default layout under the user's state directory (`~/.baitline/output`)
    pub fn default_under_home() -> AppResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::config("could not determine home directory"))?;
        Ok(Self::new(home.join(".baitline").join("output")))
    }

    /// The output base directory
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// `ExecutionResult/`
    pub fn execution_result_dir(&self) -> PathBuf {
        self.base.join(EXECUTION_RESULT_DIR)
    }

    /// `ExecutionResult/Success/{project}/round_N/phase_P/`
    pub fn response_dir(&self, success: bool, project: &str, round: u32, phase: u8) -> PathBuf {
        self.execution_result_dir()
            .join(if success { "Success" } else { "Fail" })
            .join(project)
            .join(format!("round_{}", round))
            .join(format!("phase_{}", phase))
    }

    /// `OriginalScanResult/{scanner}/CWE-{id}/{project}/{round_label}/`
    pub fn scan_report_dir(
        &self,
        scanner: &str,
        cwe_label: &str,
        project: &str,
        round_label: &str,
    ) -> PathBuf {
        self.base
            .join(ORIGINAL_SCAN_RESULT_DIR)
            .join(scanner)
            .join(cwe_label)
            .join(project)
            .join(round_label)
    }

    /// `vicious_pattern/{mode_label}/{project}/`
    pub fn vicious_pattern_dir(&self, mode_label: &str, project: &str) -> PathBuf {
        self.base
            .join(VICIOUS_PATTERN_DIR)
            .join(mode_label)
            .join(project)
    }

    /// `ExecutionResult/all_safe/{label}/{project}/`
    pub fn all_safe_dir(&self, label: &str, project: &str) -> PathBuf {
        self.execution_result_dir()
            .join("all_safe")
            .join(label)
            .join(project)
    }

    /// The campaign's checkpoint document
    pub fn checkpoint_path(&self) -> PathBuf {
        self.base.join(CHECKPOINT_FILE)
    }

    /// `ExecutionResult/campaign_report.json`
    pub fn final_report_path(&self) -> PathBuf {
        self.execution_result_dir().join("campaign_report.json")
    }
}

/// Flatten a relative file path into a single component
/// (`torch_utils/custom_ops.py` -> `torch_utils__custom_ops.py`).
pub fn encode_rel_path(rel: &str) -> String {
    rel.replace(['/', '\\'], "__")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
