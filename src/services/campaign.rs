//! Campaign Controller
//!
//! Owns one end-to-end campaign: loads or creates the checkpoint, iterates
//! the project list under the global file budget, hands each project to the
//! round engine, and finishes with the final report (plus the all-safe
//! aggregation in RAW mode).
//!
//! Resume is fully automatic: when the stored campaign is resumable, its
//! settings snapshot is used verbatim and any freshly supplied settings are
//! ignored - nothing is re-asked.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use baitline_core::{pause_secs, CancellationToken, EditorDriver};
use baitline_scanners::ScannerPair;
use tracing::{error, info, warn};

use crate::models::campaign::{ProjectInfo, ProjectStats};
use crate::models::report::{FailedLine, FinalReport};
use crate::models::settings::{CampaignSettings, Mode};
use crate::services::all_safe::AllSafeAggregator;
use crate::services::artifacts::ArtifactStore;
use crate::services::engine::{
    EngineConfig, EnginePacing, ModeStrategy, ResumePoint, RoundEngine,
};
use crate::services::retry::RetryPolicy;
use crate::services::templates::PromptTemplates;
use crate::services::validator::ResponseValidator;
use crate::storage::checkpoint::{CheckpointStore, ProgressUpdate, ResumeInfo};
use crate::storage::paths::OutputLayout;
use crate::utils::error::{AppError, AppResult};

/// Practical cap on one response wait; a rate-limit sleep alone can burn
/// half an hour
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1800);

/// How a campaign run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignOutcome {
    /// All work exhausted (projects done or budget spent)
    Completed,
    /// Cooperative interrupt; the checkpoint is resumable
    Interrupted,
}

/// Orchestrates a set of projects through the round engine
pub struct CampaignController {
    layout: OutputLayout,
    assets_dir: PathBuf,
    driver: Arc<dyn EditorDriver>,
    scanners: Arc<ScannerPair>,
    cancel: CancellationToken,
    pacing: EnginePacing,
    wait_timeout: Duration,
    validator: ResponseValidator,
    retry_sleeps: Option<(Duration, Duration)>,
}

impl CampaignController {
    pub fn new(
        layout: OutputLayout,
        assets_dir: PathBuf,
        driver: Arc<dyn EditorDriver>,
        scanners: Arc<ScannerPair>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            layout,
            assets_dir,
            driver,
            scanners,
            cancel,
            pacing: EnginePacing::default(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            validator: ResponseValidator::default(),
            retry_sleeps: None,
        }
    }

    /// Override inter-step pacing (tests run unpaced)
    pub fn with_pacing(mut self, pacing: EnginePacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Override the response wait budget
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Override the retry sleep schedule (tests use milliseconds)
    pub fn with_retry_sleeps(mut self, short: Duration, long: Duration) -> Self {
        self.retry_sleeps = Some((short, long));
        self
    }

    /// Override the response validator (tests lower the length floor)
    pub fn with_validator(mut self, validator: ResponseValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Run the campaign to completion or interrupt.
    ///
    /// `fresh_settings` seeds a new campaign; it is ignored when a
    /// resumable checkpoint exists.
    pub async fn run(&self, fresh_settings: Option<CampaignSettings>) -> AppResult<CampaignOutcome> {
        let started = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();

        let mut store = CheckpointStore::open(self.layout.checkpoint_path())?;
        let resume = store.get_resume_info();

        let settings = match &resume {
            Some(info) => {
                info!("resuming interrupted campaign: {}", info.summary());
                store.mark_running()?;
                info.settings.clone()
            }
            None => {
                let settings = fresh_settings.ok_or_else(|| {
                    AppError::config("no settings supplied and no resumable campaign found")
                })?;
                settings.validate()?;
                let names = project_names(&settings)?;
                store.create(&settings, names)?;
                settings
            }
        };

        let templates = Arc::new(PromptTemplates::load(&self.assets_dir, &settings.cwe_id)?);
        let artifacts = Arc::new(ArtifactStore::new(self.layout.clone()));

        let mut retry_policy = RetryPolicy::new(settings.max_retries_per_line);
        if let Some((short, long)) = self.retry_sleeps {
            retry_policy = retry_policy.with_sleeps(short, long);
        }

        let engine_config = EngineConfig {
            driver: self.driver.clone(),
            scanners: self.scanners.clone(),
            templates,
            artifacts: artifacts.clone(),
            validator: self.validator.clone(),
            retry_policy,
            strategy: ModeStrategy::from_settings(&settings),
            pacing: self.pacing,
            smart_wait: settings.smart_wait,
            wait_timeout: self.wait_timeout,
            cwe_id: settings.cwe_id.clone(),
            cwe_label: settings.cwe_label(),
            total_rounds: settings.total_rounds,
            file_budget: settings.file_budget,
            cancel: self.cancel.clone(),
        };

        let projects: Vec<ProjectInfo> = settings
            .project_roots
            .iter()
            .map(|root| ProjectInfo::from_root(root))
            .collect::<AppResult<_>>()?;

        let mut stats = CampaignRunStats::new(projects.len());
        let mut total_processed = store
            .current()
            .map(|d| d.total_files_processed)
            .unwrap_or(0);
        // Lines each project actually covered, for the all-safe pass
        let mut covered_lines: BTreeMap<String, Vec<String>> = BTreeMap::new();

        let start_index = resume
            .as_ref()
            .map(|r| r.progress.current_project_index)
            .unwrap_or(0);

        for (index, project) in projects.iter().enumerate() {
            if index < start_index || is_completed(&store, &project.name) {
                continue;
            }
            if self.cancel.is_cancelled() {
                return self.interrupt(&mut store);
            }

            store.update_progress(ProgressUpdate::new().project(index, &project.name))?;

            let prompt_lines = project.load_prompt_lines();
            stats
                .project_stats
                .entry(project.name.clone())
                .or_default()
                .expected_files = prompt_lines.len();

            if prompt_lines.is_empty() {
                warn!(project = %project.name, "no prompt lines, skipping project");
                stats.skipped += 1;
                continue;
            }
            if settings.file_budget > 0 && settings.remaining_budget(total_processed) == 0 {
                warn!(
                    processed = total_processed,
                    budget = settings.file_budget,
                    remaining_projects = projects.len() - index,
                    "file budget exhausted, skipping remaining projects"
                );
                stats.skipped += projects.len() - index;
                break;
            }

            let resume_point = resume_point_for(&resume, index, &project.name);
            let attacked = store.attacked_lines(&project.name);
            let mut engine = RoundEngine::new(
                engine_config.clone(),
                project.clone(),
                prompt_lines.clone(),
                total_processed,
                attacked,
            );

            info!(
                project = %project.name,
                index = index + 1,
                of = projects.len(),
                "dispatching project"
            );
            match engine.run(&mut store, resume_point).await {
                Ok(result) => {
                    total_processed += result.lines_processed;
                    let entry = stats.project_stats.entry(project.name.clone()).or_default();
                    entry.processed_files = result.lines_processed;
                    stats.failed_lines.extend(result.failed_lines);
                    stats.committed_patterns += result.committed_patterns;
                    stats.successful += 1;
                    covered_lines.insert(
                        project.name.clone(),
                        prompt_lines
                            .iter()
                            .take(result.lines_covered)
                            .cloned()
                            .collect(),
                    );

                    store.update_progress(
                        ProgressUpdate::new()
                            .completed_project(&project.name)
                            .files_processed(total_processed)
                            .reset_position(),
                    )?;
                    info!(
                        project = %project.name,
                        processed = total_processed,
                        "project complete"
                    );
                }
                Err(e) if e.is_interrupted() => return self.interrupt(&mut store),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(project = %project.name, error = %e, "project failed, moving on");
                    stats.failed += 1;
                    // The engine flushed per-line counters as it went;
                    // pick the surviving total back up from the store.
                    total_processed = store
                        .current()
                        .map(|d| d.total_files_processed)
                        .unwrap_or(total_processed);
                    store.update_progress(ProgressUpdate::new().reset_position())?;
                }
            }

            pause_secs(self.pacing.commit_pause_secs, &self.cancel)
                .await
                .map_err(|_| AppError::Interrupted)?;
        }

        if self.cancel.is_cancelled() {
            return self.interrupt(&mut store);
        }

        // RAW-mode post-pass over every processed project
        if settings.mode == Mode::Raw && settings.all_safe_enabled {
            let aggregator = AllSafeAggregator::new(self.layout.clone(), artifacts.clone());
            for (project, lines) in &covered_lines {
                if let Err(e) = aggregator.run(
                    project,
                    &settings.cwe_label(),
                    settings.total_rounds,
                    lines,
                ) {
                    warn!(project = %project, error = %e, "all-safe aggregation failed");
                }
            }
        }

        store.mark_completed()?;
        info!(
            processed = total_processed,
            successful = stats.successful,
            failed = stats.failed,
            skipped = stats.skipped,
            "campaign complete"
        );

        let report = FinalReport {
            campaign_id: store
                .current()
                .map(|d| d.campaign_id.clone())
                .unwrap_or_default(),
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            duration_secs: started.elapsed().as_secs(),
            total_projects: stats.total_projects,
            successful_projects: stats.successful,
            failed_projects: stats.failed,
            skipped_projects: stats.skipped,
            total_files_processed: total_processed,
            file_budget: settings.file_budget,
            committed_patterns: stats.committed_patterns,
            project_stats: stats.project_stats,
            failed_lines: stats.failed_lines,
            settings,
        };
        for line in &report.failed_lines {
            warn!("failed line: {}", line);
        }
        let report_path = artifacts.write_final_report(&report)?;
        info!(report = %report_path.display(), "final report written");

        Ok(CampaignOutcome::Completed)
    }

    fn interrupt(&self, store: &mut CheckpointStore) -> AppResult<CampaignOutcome> {
        warn!("interrupt received, marking checkpoint for resume");
        store.mark_interrupted()?;
        Ok(CampaignOutcome::Interrupted)
    }
}

/// Running counters of one campaign leg
struct CampaignRunStats {
    total_projects: usize,
    successful: usize,
    failed: usize,
    skipped: usize,
    committed_patterns: usize,
    project_stats: BTreeMap<String, ProjectStats>,
    failed_lines: Vec<FailedLine>,
}

impl CampaignRunStats {
    fn new(total_projects: usize) -> Self {
        Self {
            total_projects,
            successful: 0,
            failed: 0,
            skipped: 0,
            committed_patterns: 0,
            project_stats: BTreeMap::new(),
            failed_lines: Vec::new(),
        }
    }
}

fn project_names(settings: &CampaignSettings) -> AppResult<Vec<String>> {
    settings
        .project_roots
        .iter()
        .map(|root| ProjectInfo::from_root(root).map(|p| p.name))
        .collect()
}

fn is_completed(store: &CheckpointStore, project: &str) -> bool {
    store
        .current()
        .map(|d| d.completed_projects.iter().any(|p| p == project))
        .unwrap_or(false)
}

/// The stored position applies only to the project it was recorded in.
fn resume_point_for(resume: &Option<ResumeInfo>, index: usize, name: &str) -> ResumePoint {
    match resume {
        Some(info)
            if info.progress.current_project_index == index
                && info.progress.current_project_name == name =>
        {
            ResumePoint {
                round: info.progress.current_round,
                phase: info.progress.current_phase,
                line: info.progress.current_line,
            }
        }
        _ => ResumePoint::default(),
    }
}
