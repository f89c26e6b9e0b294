//! Prompt Templates
//!
//! Loads the three prompt templates and the per-CWE example snippet from
//! the asset directory and renders them for a target file. Rendering is
//! pure: the same inputs always produce byte-identical output.
//!
//! Substitution tokens, and nothing else:
//! - `{target_file}` - the target file's relative path
//! - `{CWE-XXX}` - the weakness label, e.g. `CWE-022`
//! - `{{CWE_EXAMPLE_CODE}}` - the example snippet body (empty if missing)

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::utils::error::{AppError, AppResult};

/// File names of the three templates inside the asset directory
const TEMPLATE_FILES: [(&str, &str); 3] = [
    ("initial_query", "initial_query.txt"),
    ("following_query", "following_query.txt"),
    ("coding_instruction", "coding_instruction.txt"),
];

/// Subdirectory holding the per-CWE example snippets
const CWE_EXAMPLE_DIR: &str = "CWE";

/// The loaded, render-ready template set for one campaign
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    initial_query: String,
    following_query: String,
    coding_instruction: String,
    cwe_example: String,
    cwe_label: String,
}

impl PromptTemplates {
    /// Load all templates for `cwe_id` from `assets_dir`.
    ///
    /// A missing template file is a fatal configuration error. A missing
    /// CWE example is only a warning; the placeholder renders empty.
    pub fn load(assets_dir: &Path, cwe_id: &str) -> AppResult<Self> {
        let mut bodies = Vec::with_capacity(TEMPLATE_FILES.len());
        for (name, file) in TEMPLATE_FILES {
            let path = assets_dir.join(file);
            let body = std::fs::read_to_string(&path).map_err(|e| {
                AppError::config(format!(
                    "missing prompt template '{}' at {}: {}",
                    name,
                    path.display(),
                    e
                ))
            })?;
            debug!(template = name, bytes = body.len(), "loaded prompt template");
            bodies.push(body);
        }

        let cwe_example = load_cwe_example(assets_dir, cwe_id);
        let mut bodies = bodies.into_iter();

        Ok(Self {
            initial_query: bodies.next().unwrap_or_default(),
            following_query: bodies.next().unwrap_or_default(),
            coding_instruction: bodies.next().unwrap_or_default(),
            cwe_example,
            cwe_label: format!("CWE-{}", cwe_id),
        })
    }

    /// Build a template set directly from strings (tests, embedded use)
    pub fn from_parts(
        initial_query: impl Into<String>,
        following_query: impl Into<String>,
        coding_instruction: impl Into<String>,
        cwe_example: impl Into<String>,
        cwe_id: &str,
    ) -> Self {
        Self {
            initial_query: initial_query.into(),
            following_query: following_query.into(),
            coding_instruction: coding_instruction.into(),
            cwe_example: cwe_example.into(),
            cwe_label: format!("CWE-{}", cwe_id),
        }
    }

    /// Render the query prompt for a round. Round 1 uses the initial
    /// template, later rounds the following template.
    pub fn render_query(&self, round: u32, target_file: &str) -> String {
        let template = if round == 1 {
            &self.initial_query
        } else {
            &self.following_query
        };
        self.render(template, target_file)
    }

    /// Render the coding-phase prompt
    pub fn render_coding(&self, target_file: &str) -> String {
        self.render(&self.coding_instruction, target_file)
    }

    /// The example snippet replaces its placeholder first so tokens inside
    /// the snippet are never re-substituted.
    fn render(&self, template: &str, target_file: &str) -> String {
        template
            .replace("{{CWE_EXAMPLE_CODE}}", &self.cwe_example)
            .replace("{target_file}", target_file)
            .replace("{CWE-XXX}", &self.cwe_label)
    }
}

/// Example file is named by the CWE number without leading zeros
/// (`CWE/22.txt` for CWE-022).
fn load_cwe_example(assets_dir: &Path, cwe_id: &str) -> String {
    let trimmed = cwe_id.trim_start_matches('0');
    if trimmed.is_empty() {
        warn!(cwe_id, "no usable CWE number, example placeholder renders empty");
        return String::new();
    }
    let path: PathBuf = assets_dir.join(CWE_EXAMPLE_DIR).join(format!("{}.txt", trimmed));
    match std::fs::read_to_string(&path) {
        Ok(body) => body.trim().to_string(),
        Err(_) => {
            warn!(path = %path.display(), "CWE example file missing, placeholder renders empty");
            String::new()
        }
    }
}
