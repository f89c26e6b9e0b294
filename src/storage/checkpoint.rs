//! Campaign Checkpoint
//!
//! A single durable JSON document per campaign, rewritten atomically
//! (write to temp file, fsync, rename) at every non-trivial state
//! transition. The document is the source of truth for resume: mode and
//! settings are snapshotted at creation and taken verbatim when a crashed
//! or interrupted campaign restarts.
//!
//! Writes are content-addressed: replaying an update that changes nothing
//! leaves the file untouched, so progress replays during resume are cheap
//! no-ops.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::models::settings::CampaignSettings;
use crate::models::Mode;
use crate::storage::paths::ensure_dir;
use crate::utils::error::{AppError, AppResult};

/// Lifecycle state of a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// The campaign is (or was, at crash time) executing
    Running,
    /// Every project finished or the budget was exhausted cleanly
    Completed,
    /// The process was interrupted; the document is resumable
    Interrupted,
}

/// Fine-grained position inside the campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Index into `project_list` of the project being processed
    pub current_project_index: usize,
    /// Name of that project (for display and resume validation)
    pub current_project_name: String,
    /// 1-based round number
    pub current_round: u32,
    /// 1 = query phase, 2 = coding phase
    pub current_phase: u8,
    /// 1-based line index within the prompt file
    pub current_line: usize,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            current_project_index: 0,
            current_project_name: String::new(),
            current_round: 1,
            current_phase: 1,
            current_line: 1,
        }
    }
}

/// The durable campaign record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointDoc {
    /// Random id minted at creation
    pub campaign_id: String,
    /// Execution mode (duplicated out of settings for schema stability)
    pub mode: Mode,
    /// Immutable settings snapshot
    pub settings: CampaignSettings,
    /// Project names, in processing order
    pub project_list: Vec<String>,
    /// Projects that finished all their rounds
    pub completed_projects: Vec<String>,
    /// Projects whose baseline scan completed
    pub baseline_completed: Vec<String>,
    /// Position of the in-flight work
    pub progress: Progress,
    /// Global processed (project, round, line) count
    pub total_files_processed: u64,
    /// project -> line -> first round the line judged vulnerable
    pub line_vulnerability_detected: BTreeMap<String, BTreeMap<usize, u32>>,
    /// Lifecycle state
    pub status: CampaignStatus,
    /// RFC 3339 creation time
    pub created_at: String,
    /// RFC 3339 time of the last effective write
    pub updated_at: String,
}

/// One merge against the checkpoint.
///
/// Scalar fields replace, `completed_project` / `baseline_completed` append
/// (de-duplicated), and `line_detected` records only the first round a line
/// was flagged.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub project_index: Option<usize>,
    pub project_name: Option<String>,
    pub current_round: Option<u32>,
    pub current_phase: Option<u8>,
    pub current_line: Option<usize>,
    pub completed_project: Option<String>,
    pub baseline_completed: Option<String>,
    pub total_files_processed: Option<u64>,
    pub line_detected: Option<(String, usize, u32)>,
}

impl ProgressUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, index: usize, name: impl Into<String>) -> Self {
        self.project_index = Some(index);
        self.project_name = Some(name.into());
        self
    }

    pub fn round(mut self, round: u32) -> Self {
        self.current_round = Some(round);
        self
    }

    pub fn phase(mut self, phase: u8) -> Self {
        self.current_phase = Some(phase);
        self
    }

    pub fn line(mut self, line: usize) -> Self {
        self.current_line = Some(line);
        self
    }

    /// Reset round/phase/line to the start of a project
    pub fn reset_position(self) -> Self {
        self.round(1).phase(1).line(1)
    }

    pub fn completed_project(mut self, name: impl Into<String>) -> Self {
        self.completed_project = Some(name.into());
        self
    }

    pub fn baseline_completed(mut self, name: impl Into<String>) -> Self {
        self.baseline_completed = Some(name.into());
        self
    }

    pub fn files_processed(mut self, total: u64) -> Self {
        self.total_files_processed = Some(total);
        self
    }

    pub fn line_detected(mut self, project: impl Into<String>, line: usize, round: u32) -> Self {
        self.line_detected = Some((project.into(), line, round));
        self
    }
}

/// Everything the controller needs to resume an interrupted campaign
#[derive(Debug, Clone)]
pub struct ResumeInfo {
    pub campaign_id: String,
    pub settings: CampaignSettings,
    pub project_list: Vec<String>,
    pub completed_projects: Vec<String>,
    pub progress: Progress,
    pub total_files_processed: u64,
    pub line_vulnerability_detected: BTreeMap<String, BTreeMap<usize, u32>>,
    /// Remaining budget units, when a budget is set
    pub remaining_quota: Option<u64>,
}

impl ResumeInfo {
    /// Human-readable summary logged before resuming
    pub fn summary(&self) -> String {
        let quota = self
            .remaining_quota
            .map(|q| q.to_string())
            .unwrap_or_else(|| "unlimited".to_string());
        format!(
            "mode {} / {} | rounds {} | budget {} | projects {}/{} | files {} | resume at project '{}' round {} phase {} line {} | remaining quota {}",
            self.settings.mode,
            self.settings.cwe_label(),
            self.settings.total_rounds,
            self.settings.file_budget,
            self.completed_projects.len(),
            self.project_list.len(),
            self.total_files_processed,
            self.progress.current_project_name,
            self.progress.current_round,
            self.progress.current_phase,
            self.progress.current_line,
            quota,
        )
    }
}

/// Owner of the checkpoint file. Atomic rename is the only write path.
pub struct CheckpointStore {
    path: PathBuf,
    doc: Option<CheckpointDoc>,
    last_digest: Option<[u8; 32]>,
}

impl CheckpointStore {
    /// Open a store, loading an existing document if present.
    ///
    /// A missing file means no campaign exists yet; an unreadable or
    /// unparsable file is state corruption and refuses to start.
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let doc = match std::fs::read_to_string(&path) {
            Ok(text) => {
                let doc: CheckpointDoc = serde_json::from_str(&text).map_err(|e| {
                    AppError::checkpoint(format!(
                        "unreadable checkpoint {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Some(doc)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(AppError::checkpoint(format!(
                    "cannot read checkpoint {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let last_digest = doc.as_ref().map(digest_of);
        Ok(Self {
            path,
            doc,
            last_digest,
        })
    }

    /// The loaded document, if any
    pub fn current(&self) -> Option<&CheckpointDoc> {
        self.doc.as_ref()
    }

    /// Create a fresh campaign record with `status = running` and persist it.
    pub fn create(
        &mut self,
        settings: &CampaignSettings,
        project_list: Vec<String>,
    ) -> AppResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let doc = CheckpointDoc {
            campaign_id: uuid::Uuid::new_v4().to_string(),
            mode: settings.mode,
            settings: settings.clone(),
            project_list,
            completed_projects: Vec::new(),
            baseline_completed: Vec::new(),
            progress: Progress::default(),
            total_files_processed: 0,
            line_vulnerability_detected: BTreeMap::new(),
            status: CampaignStatus::Running,
            created_at: now.clone(),
            updated_at: now,
        };
        info!(campaign_id = %doc.campaign_id, mode = %doc.mode, "created campaign checkpoint");
        self.doc = Some(doc);
        self.last_digest = None;
        self.persist()
    }

    /// Merge a progress update and persist. The only mutator for progress
    /// fields.
    pub fn update_progress(&mut self, update: ProgressUpdate) -> AppResult<()> {
        let doc = self
            .doc
            .as_mut()
            .ok_or_else(|| AppError::checkpoint("update_progress before create"))?;

        if let Some(index) = update.project_index {
            doc.progress.current_project_index = index;
        }
        if let Some(name) = update.project_name {
            doc.progress.current_project_name = name;
        }
        if let Some(round) = update.current_round {
            doc.progress.current_round = round;
        }
        if let Some(phase) = update.current_phase {
            doc.progress.current_phase = phase;
        }
        if let Some(line) = update.current_line {
            doc.progress.current_line = line;
        }
        if let Some(total) = update.total_files_processed {
            doc.total_files_processed = total;
        }
        if let Some(name) = update.completed_project {
            if !doc.completed_projects.contains(&name) {
                doc.completed_projects.push(name);
            }
        }
        if let Some(name) = update.baseline_completed {
            if !doc.baseline_completed.contains(&name) {
                doc.baseline_completed.push(name);
            }
        }
        if let Some((project, line, round)) = update.line_detected {
            doc.line_vulnerability_detected
                .entry(project)
                .or_default()
                .entry(line)
                .or_insert(round);
        }

        self.persist()
    }

    /// Mark the campaign running again (resume path) and persist.
    pub fn mark_running(&mut self) -> AppResult<()> {
        self.set_status(CampaignStatus::Running)
    }

    /// Mark the campaign completed and persist.
    pub fn mark_completed(&mut self) -> AppResult<()> {
        self.set_status(CampaignStatus::Completed)
    }

    /// Mark the campaign interrupted and persist.
    pub fn mark_interrupted(&mut self) -> AppResult<()> {
        self.set_status(CampaignStatus::Interrupted)
    }

    fn set_status(&mut self, status: CampaignStatus) -> AppResult<()> {
        let doc = self
            .doc
            .as_mut()
            .ok_or_else(|| AppError::checkpoint("status change before create"))?;
        doc.status = status;
        self.persist()
    }

    /// Delete the stored campaign state.
    pub fn clear(&mut self) -> AppResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        self.doc = None;
        self.last_digest = None;
        Ok(())
    }

    /// Whether the baseline scan already ran for a project
    pub fn is_baseline_completed(&self, project: &str) -> bool {
        self.doc
            .as_ref()
            .map(|d| d.baseline_completed.iter().any(|p| p == project))
            .unwrap_or(false)
    }

    /// line -> first round detected, for one project
    pub fn attacked_lines(&self, project: &str) -> BTreeMap<usize, u32> {
        self.doc
            .as_ref()
            .and_then(|d| d.line_vulnerability_detected.get(project).cloned())
            .unwrap_or_default()
    }

    /// Resume token. `None` unless the stored campaign is interrupted and
    /// its budget is not already exhausted.
    pub fn get_resume_info(&self) -> Option<ResumeInfo> {
        let doc = self.doc.as_ref()?;
        if doc.status != CampaignStatus::Interrupted {
            return None;
        }
        let budget = doc.settings.file_budget;
        if budget > 0 && doc.total_files_processed >= budget {
            return None;
        }
        let remaining_quota = if budget > 0 {
            Some(budget - doc.total_files_processed)
        } else {
            None
        };
        Some(ResumeInfo {
            campaign_id: doc.campaign_id.clone(),
            settings: doc.settings.clone(),
            project_list: doc.project_list.clone(),
            completed_projects: doc.completed_projects.clone(),
            progress: doc.progress.clone(),
            total_files_processed: doc.total_files_processed,
            line_vulnerability_detected: doc.line_vulnerability_detected.clone(),
            remaining_quota,
        })
    }

    /// Write the document if its content changed since the last write.
    fn persist(&mut self) -> AppResult<()> {
        let doc = match self.doc.as_mut() {
            Some(doc) => doc,
            None => return Ok(()),
        };

        let digest = digest_of(doc);
        if self.last_digest == Some(digest) {
            debug!("checkpoint unchanged, skipping write");
            return Ok(());
        }

        doc.updated_at = chrono::Utc::now().to_rfc3339();
        let json = serde_json::to_string_pretty(doc)?;

        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        self.last_digest = Some(digest);
        Ok(())
    }
}

/// Content digest excluding the write timestamp, so identical state never
/// rewrites the file.
fn digest_of(doc: &CheckpointDoc) -> [u8; 32] {
    let mut clone = doc.clone();
    clone.updated_at = String::new();
    let json = serde_json::to_vec(&clone).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&json);
    hasher.finalize().into()
}
