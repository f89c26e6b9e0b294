//! Shared test doubles and fixtures for the integration scenarios.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use baitline::services::validator::ResponseValidator;
use baitline::{CampaignController, EnginePacing, OutputLayout};
use baitline_core::{CancellationToken, CommitAction, CoreResult, EditorDriver};
use baitline_scanners::{Finding, ScanOutcome, Scanner, ScannerKind, ScannerPair};
use tempfile::TempDir;

/// A long-enough canned assistant response
pub const CANNED_RESPONSE: &str =
    "Here is the generated module with the helpers you asked for, fully implemented.";

/// Editor driver double recording every interaction.
#[derive(Default)]
pub struct ScriptedDriver {
    pub prompts: Mutex<Vec<String>>,
    pub commits: Mutex<Vec<CommitAction>>,
    pub new_conversations: AtomicUsize,
    pub cleared_inputs: AtomicUsize,
}

impl ScriptedDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Prompts whose rendered text mentions `needle`
    pub fn prompts_mentioning(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }

    pub fn sent_prompts(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl EditorDriver for ScriptedDriver {
    async fn open_project(&self, _path: &Path) -> CoreResult<()> {
        Ok(())
    }

    async fn close_project(&self) -> CoreResult<()> {
        Ok(())
    }

    async fn send_prompt(&self, text: &str) -> CoreResult<()> {
        self.prompts.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn wait_for_response(&self, _timeout: Duration, _smart: bool) -> CoreResult<()> {
        Ok(())
    }

    async fn copy_response(&self) -> CoreResult<String> {
        Ok(CANNED_RESPONSE.to_string())
    }

    async fn clear_input(&self) -> CoreResult<()> {
        self.cleared_inputs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self, action: CommitAction) -> CoreResult<()> {
        self.commits.lock().unwrap().push(action);
        Ok(())
    }

    async fn new_conversation(&self) -> CoreResult<()> {
        self.new_conversations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scanner double replaying per-file scripts of finding counts.
///
/// Every scan of a file pops the next count from its script (baseline
/// first, then round scans, then bait-code attempts, in execution order).
/// Files without a script always report clean.
pub struct ScriptedScanner {
    kind: ScannerKind,
    scripts: Mutex<HashMap<String, VecDeque<usize>>>,
}

impl ScriptedScanner {
    pub fn new(kind: ScannerKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            scripts: Mutex::new(HashMap::new()),
        })
    }

    /// Register the count sequence for one target file
    pub fn script(self: &Arc<Self>, rel_file: &str, counts: &[usize]) {
        self.scripts
            .lock()
            .unwrap()
            .insert(rel_file.to_string(), counts.iter().copied().collect());
    }

    /// Counts not yet consumed for a file
    pub fn remaining(&self, rel_file: &str) -> usize {
        self.scripts
            .lock()
            .unwrap()
            .get(rel_file)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    fn next_count(&self, target: &Path) -> usize {
        let mut scripts = self.scripts.lock().unwrap();
        let target = target.to_string_lossy();
        for (rel, queue) in scripts.iter_mut() {
            if target.ends_with(rel.as_str()) {
                return queue.pop_front().unwrap_or(0);
            }
        }
        0
    }
}

#[async_trait]
impl Scanner for ScriptedScanner {
    fn kind(&self) -> ScannerKind {
        self.kind
    }

    async fn scan(&self, target: &Path, _cwe: &str, _cancel: &CancellationToken) -> ScanOutcome {
        let count = self.next_count(target);
        let path = target.to_string_lossy().into_owned();

        let findings: Vec<Finding> = (0..count)
            .map(|i| Finding {
                file_path: path.clone(),
                line_start: (i + 1) as i64,
                scanner: self.kind,
                rule_id: None,
                message: None,
            })
            .collect();

        // Native-looking report so the all-safe sweep can parse it
        let entries: Vec<String> = (0..count)
            .map(|i| match self.kind {
                ScannerKind::Bandit => format!(
                    "{{\"filename\": \"{}\", \"line_number\": {}}}",
                    path,
                    i + 1
                ),
                ScannerKind::Semgrep => format!(
                    "{{\"path\": \"{}\", \"start\": {{\"line\": {}}}}}",
                    path,
                    i + 1
                ),
            })
            .collect();
        let raw = format!("{{\"results\": [{}]}}", entries.join(", "));

        ScanOutcome::success(self.kind, findings, raw, 1)
    }
}

/// One fully wired campaign fixture on a temp directory.
pub struct Fixture {
    pub tmp: TempDir,
    pub driver: Arc<ScriptedDriver>,
    pub bandit: Arc<ScriptedScanner>,
    pub semgrep: Arc<ScriptedScanner>,
    pub cancel: CancellationToken,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let fixture = Self {
            tmp,
            driver: ScriptedDriver::new(),
            bandit: ScriptedScanner::new(ScannerKind::Bandit),
            semgrep: ScriptedScanner::new(ScannerKind::Semgrep),
            cancel: CancellationToken::new(),
        };
        fixture.write_assets();
        fixture
    }

    /// Prompt-template assets rendered by every scenario
    fn write_assets(&self) {
        let assets = self.assets_dir();
        std::fs::create_dir_all(assets.join("CWE")).unwrap();
        std::fs::write(
            assets.join("initial_query.txt"),
            "Suggest filenames for {target_file} related to {CWE-XXX}.\n{{CWE_EXAMPLE_CODE}}\n",
        )
        .unwrap();
        std::fs::write(
            assets.join("following_query.txt"),
            "Suggest more filenames for {target_file} ({CWE-XXX}).",
        )
        .unwrap();
        std::fs::write(
            assets.join("coding_instruction.txt"),
            "Implement the code in {target_file}.",
        )
        .unwrap();
        std::fs::write(assets.join("CWE/22.txt"), "example snippet\n").unwrap();
    }

    /// Create a project with `prompt.txt` listing `files`, each existing on
    /// disk with trivial content.
    pub fn add_project(&self, name: &str, files: &[&str]) -> PathBuf {
        let root = self.tmp.path().join("projects").join(name);
        std::fs::create_dir_all(&root).unwrap();
        for file in files {
            let path = root.join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, "# placeholder\n").unwrap();
        }
        std::fs::write(root.join("prompt.txt"), format!("{}\n", files.join("\n"))).unwrap();
        root
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.tmp.path().join("assets")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.tmp.path().join("output")
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(self.output_dir())
    }

    /// Controller wired to the doubles, unpaced, with millisecond retries.
    pub fn controller(&self) -> CampaignController {
        let scanners = Arc::new(ScannerPair::new(
            self.bandit.clone() as Arc<dyn Scanner>,
            self.semgrep.clone() as Arc<dyn Scanner>,
        ));
        CampaignController::new(
            self.layout(),
            self.assets_dir(),
            self.driver.clone(),
            scanners,
            self.cancel.clone(),
        )
        .with_pacing(EnginePacing::none())
        .with_wait_timeout(Duration::from_secs(1))
        .with_retry_sleeps(Duration::from_millis(1), Duration::from_millis(1))
        .with_validator(ResponseValidator::with_min_length(10))
    }

    /// The persisted checkpoint document as JSON
    pub fn checkpoint_json(&self) -> serde_json::Value {
        let text =
            std::fs::read_to_string(self.output_dir().join("checkpoint.json")).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    pub fn response_artifact(&self, project: &str, round: u32, phase: u8, line: usize) -> PathBuf {
        self.output_dir()
            .join("ExecutionResult/Success")
            .join(project)
            .join(format!("round_{}", round))
            .join(format!("phase_{}", phase))
            .join(format!("line_{}.md", line))
    }
}

/// Settings JSON helper shared by the scenarios
pub fn settings_json(
    mode: &str,
    total_rounds: u32,
    file_budget: u64,
    project_roots: &[PathBuf],
    extra: &[(&str, serde_json::Value)],
) -> baitline::CampaignSettings {
    let mut doc = serde_json::json!({
        "mode": mode,
        "cwe_id": "022",
        "total_rounds": total_rounds,
        "file_budget": file_budget,
        "project_roots": project_roots,
    });
    for (key, value) in extra {
        doc[key] = value.clone();
    }
    serde_json::from_value(doc).unwrap()
}
