//! Campaign Models
//!
//! Project descriptions and the per-project prompt list. A project is a
//! filesystem root plus a `prompt.txt` naming the target files, one
//! relative path per line.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

/// Name of the per-project target list
pub const PROMPT_FILE_NAME: &str = "prompt.txt";

/// One target project of a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Directory name, used as the project key in every output tree
    pub name: String,
    /// Absolute project root
    pub path: PathBuf,
}

impl ProjectInfo {
    /// Describe a project by its root directory.
    ///
    /// The project name is the final path component; a root without one
    /// (e.g. `/`) is a configuration error.
    pub fn from_root(root: &Path) -> AppResult<Self> {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AppError::config(format!("project root has no name: {}", root.display()))
            })?;
        Ok(Self {
            name,
            path: root.to_path_buf(),
        })
    }

    /// Path of this project's `prompt.txt`
    pub fn prompt_path(&self) -> PathBuf {
        self.path.join(PROMPT_FILE_NAME)
    }

    /// Load this project's target list (see `load_prompt_lines`).
    /// A missing prompt file yields an empty list.
    pub fn load_prompt_lines(&self) -> Vec<String> {
        match std::fs::read_to_string(self.prompt_path()) {
            Ok(text) => load_prompt_lines(&text),
            Err(_) => Vec::new(),
        }
    }
}

/// Parse a prompt document into target file paths.
///
/// Lines are trimmed, blanks skipped, and duplicates removed keeping the
/// first occurrence.
pub fn load_prompt_lines(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut lines = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if seen.insert(line.to_string()) {
            lines.push(line.to_string());
        }
    }
    lines
}

/// Per-project processing statistics for the final report
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProjectStats {
    /// Lines listed in the project's prompt file
    pub expected_files: usize,
    /// (round, line) units actually processed for this project
    pub processed_files: u64,
}
