//! Round Engine
//!
//! Drives the two-phase attack loop for one project:
//!
//! ```text
//! open project -> baseline scan ->
//!   for each round:
//!     Phase 1 (query)  per line -> commit(keep)
//!     Phase 2 (coding) per line + scan -> commit(revert)
//!     bait-code test over pending patterns (AS mode)
//!     commit survivors to the vicious-pattern tree
//! -> close project
//! ```
//!
//! The AS/RAW divergence is captured in a small `ModeStrategy` value so the
//! loop body stays uniform: bait testing on or off, early termination on or
//! off, each with its own judge policy.
//!
//! Checkpoint rule: progress is recorded before the externally visible step
//! it describes, so a restart may re-attempt an operation but never skips
//! one.


use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use baitline_core::{pause_secs, CancellationToken, CommitAction, CoreError, EditorDriver};
use baitline_scanners::{FileScanCounts, JudgePolicy, ScannerPair};
use tracing::{debug, info, warn};

use crate::models::campaign::ProjectInfo;
use crate::models::report::FailedLine;
use crate::models::settings::CampaignSettings;
use crate::services::artifacts::{ArtifactStore, ResponseMeta};
use crate::services::baseline::BaselineScanner;
use crate::services::retry::{RetryController, RetryDecision, RetryPolicy};
use crate::services::templates::PromptTemplates;
use crate::services::validator::{ResponseClass, ResponseValidator};
use crate::storage::checkpoint::{CheckpointStore, ProgressUpdate};
use crate::utils::error::{AppError, AppResult};

pub use bait_test::BaitTestSpec;

/// Copy attempts before an empty response counts as a transport failure
const COPY_ATTEMPTS: u32 = 3;

/// Inter-step pacing. Tests zero these out.
#[derive(Debug, Clone, Copy)]
pub struct EnginePacing {
    /// Pause between lines (seconds)
    pub line_pause_secs: f64,
    /// Pause after project open and keep/revert commits (seconds)
    pub commit_pause_secs: f64,
    /// Pause between response-copy attempts (seconds)
    pub copy_retry_pause_secs: f64,
}

impl Default for EnginePacing {
    fn default() -> Self {
        Self {
            line_pause_secs: 1.5,
            commit_pause_secs: 2.0,
            copy_retry_pause_secs: 2.0,
        }
    }
}

impl EnginePacing {
    /// No pacing, for tests
    pub fn none() -> Self {
        Self {
            line_pause_secs: 0.0,
            commit_pause_secs: 0.0,
            copy_retry_pause_secs: 0.0,
        }
    }
}

/// The AS/RAW behavioral split, as data
#[derive(Debug, Clone)]
pub struct ModeStrategy {
    /// Bait-code verification before committing patterns (AS mode)
    pub bait_test: Option<BaitTestSpec>,
    /// Stop attacking a line once this policy judges it vulnerable (RAW mode)
    pub early_termination: Option<JudgePolicy>,
}

impl ModeStrategy {
    /// Derive the strategy from campaign settings
    pub fn from_settings(settings: &CampaignSettings) -> Self {
        if settings.mode.is_as() {
            Self {
                bait_test: Some(BaitTestSpec {
                    rounds: settings.bait_code_test_rounds,
                    policy: settings.judge_policy,
                }),
                early_termination: None,
            }
        } else {
            Self {
                bait_test: None,
                early_termination: settings
                    .early_termination_enabled
                    .then_some(settings.early_termination_policy),
            }
        }
    }
}

/// Shared collaborators and knobs, identical for every project of a campaign
#[derive(Clone)]
pub struct EngineConfig {
    pub driver: Arc<dyn EditorDriver>,
    pub scanners: Arc<ScannerPair>,
    pub templates: Arc<PromptTemplates>,
    pub artifacts: Arc<ArtifactStore>,
    pub validator: ResponseValidator,
    pub retry_policy: RetryPolicy,
    pub strategy: ModeStrategy,
    pub pacing: EnginePacing,
    pub smart_wait: bool,
    pub wait_timeout: Duration,
    pub cwe_id: String,
    pub cwe_label: String,
    pub total_rounds: u32,
    pub file_budget: u64,
    pub cancel: CancellationToken,
}

/// Where to re-enter an interrupted project
#[derive(Debug, Clone, Copy)]
pub struct ResumePoint {
    pub round: u32,
    pub phase: u8,
    pub line: usize,
}

impl Default for ResumePoint {
    fn default() -> Self {
        Self {
            round: 1,
            phase: 1,
            line: 1,
        }
    }
}

/// What one project run produced
#[derive(Debug, Default)]
pub struct ProjectRunResult {
    /// (round, line) units processed or skipped in Phase 2
    pub lines_processed: u64,
    /// Distinct prompt lines any round touched (quota truncation included)
    pub lines_covered: usize,
    /// Lines that exhausted their retries
    pub failed_lines: Vec<FailedLine>,
    /// Vicious patterns committed (AS mode)
    pub committed_patterns: usize,
}

/// A pattern awaiting bait-code verification
#[derive(Debug, Clone)]
pub(crate) struct PendingVicious {
    pub line: usize,
    pub rel_file: String,
    pub counts: FileScanCounts,
}

/// The per-project attack loop
pub struct RoundEngine {
    config: EngineConfig,
    project: ProjectInfo,
    prompt_lines: Vec<String>,
    /// Campaign-wide processed count before this project run
    processed_before: u64,
    /// line -> round of first confirmed detection; lines here are skipped
    attacked: BTreeMap<usize, u32>,
    /// round -> line -> response text, capped to the two latest rounds
    round_responses: BTreeMap<u32, BTreeMap<usize, String>>,
    pending_vicious: Vec<PendingVicious>,
    result: ProjectRunResult,
}

impl RoundEngine {
    /// Build the engine for one project. `prompt_lines` is the de-duplicated
    /// target list (possibly already truncated to the campaign quota);
    /// `attacked` is the early-termination state recovered from the
    /// checkpoint.
    pub fn new(
        config: EngineConfig,
        project: ProjectInfo,
        prompt_lines: Vec<String>,
        processed_before: u64,
        attacked: BTreeMap<usize, u32>,
    ) -> Self {
        Self {
            config,
            project,
            prompt_lines,
            processed_before,
            attacked,
            round_responses: BTreeMap::new(),
            pending_vicious: Vec::new(),
            result: ProjectRunResult::default(),
        }
    }

    /// Run all (remaining) rounds of this project.
    pub async fn run(
        &mut self,
        checkpoint: &mut CheckpointStore,
        resume: ResumePoint,
    ) -> AppResult<ProjectRunResult> {
        if self.prompt_lines.is_empty() {
            warn!(project = %self.project.name, "no target lines, nothing to do");
            return Ok(std::mem::take(&mut self.result));
        }

        info!(
            project = %self.project.name,
            lines = self.prompt_lines.len(),
            rounds = self.config.total_rounds,
            cwe = %self.config.cwe_label,
            "starting attack rounds"
        );

        self.config
            .driver
            .open_project(&self.project.path)
            .await
            .map_err(map_driver_err)?;
        self.pause_commit().await?;

        let run = self.run_rounds(checkpoint, resume).await;

        // Close the project on both paths; a failed close is not fatal.
        if let Err(e) = self.config.driver.close_project().await {
            if e.is_cancelled() {
                return Err(AppError::Interrupted);
            }
            warn!(error = %e, "failed to close project");
        }

        run?;
        Ok(std::mem::take(&mut self.result))
    }

    async fn run_rounds(
        &mut self,
        checkpoint: &mut CheckpointStore,
        resume: ResumePoint,
    ) -> AppResult<()> {
        let baseline = BaselineScanner::new(
            self.config.scanners.clone(),
            self.config.artifacts.clone(),
        );
        let prompt_lines = self.prompt_lines.clone();
        baseline
            .run(
                &self.project,
                &prompt_lines,
                &self.config.cwe_id,
                &self.config.cwe_label,
                checkpoint,
                &self.config.cancel,
            )
            .await?;

        for round in resume.round..=self.config.total_rounds {
            let Some(line_cap) = self.round_line_cap() else {
                info!(
                    project = %self.project.name,
                    round,
                    "file budget exhausted, ending project early"
                );
                break;
            };

            self.result.lines_covered = self.result.lines_covered.max(line_cap);

            let is_resume_round = round == resume.round;
            let phase_start = if is_resume_round { resume.phase } else { 1 };
            let line_start = if is_resume_round { resume.line } else { 1 };

            info!(
                project = %self.project.name,
                round,
                total = self.config.total_rounds,
                "round start"
            );
            checkpoint.update_progress(
                ProgressUpdate::new()
                    .round(round)
                    .phase(phase_start)
                    .line(line_start),
            )?;

            let phase2_start = if phase_start <= 1 {
                self.run_phase1(checkpoint, round, line_start, line_cap)
                    .await?;

                info!("keeping assistant edits after query phase");
                self.config
                    .driver
                    .commit(CommitAction::Keep)
                    .await
                    .map_err(map_driver_err)?;
                self.pause_commit().await?;

                checkpoint.update_progress(ProgressUpdate::new().phase(2).line(1))?;
                1
            } else {
                info!(round, "resume skips query phase");
                line_start
            };

            self.pending_vicious.clear();
            self.run_phase2(checkpoint, round, phase2_start, line_cap)
                .await?;

            info!("reverting assistant edits after coding phase");
            self.config
                .driver
                .commit(CommitAction::Revert)
                .await
                .map_err(map_driver_err)?;
            self.pause_commit().await?;

            // The project is now back to its pre-code, post-naming state;
            // verify and commit the patterns found this round.
            if let Some(spec) = self.config.strategy.bait_test.clone() {
                self.verify_and_commit(checkpoint, round, &spec).await?;
            }

            checkpoint.update_progress(ProgressUpdate::new().round(round + 1).phase(1).line(1))?;

            // Cap response memory to the two most recent rounds
            if round >= 2 {
                self.round_responses.remove(&(round - 2));
            }
            info!(project = %self.project.name, round, "round complete");
        }

        Ok(())
    }

    /// Lines this round may touch under the budget. `None` when no budget
    /// remains at all.
    fn round_line_cap(&self) -> Option<usize> {
        if self.config.file_budget == 0 {
            return Some(self.prompt_lines.len());
        }
        let used = self.processed_before + self.result.lines_processed;
        let remaining = self.config.file_budget.saturating_sub(used);
        if remaining == 0 {
            return None;
        }
        Some(self.prompt_lines.len().min(remaining as usize))
    }

    // ── Phase 1: query ─────────────────────────────────────────────────

    async fn run_phase1(
        &mut self,
        checkpoint: &mut CheckpointStore,
        round: u32,
        start_line: usize,
        line_cap: usize,
    ) -> AppResult<()> {
        debug!(round, lines = line_cap, "query phase start");
        let lines: Vec<(usize, String)> = self.numbered_lines(line_cap);

        for (idx, rel_file) in lines {
            if idx < start_line {
                continue;
            }
            if let Some(found_round) = self.attacked.get(&idx) {
                info!(line = idx, found_round, "line already attacked, skipping query");
                continue;
            }

            checkpoint.update_progress(ProgressUpdate::new().phase(1).line(idx))?;

            let prompt = self.config.templates.render_query(round, &rel_file);
            if let Some(response) = self.obtain_response(&prompt, round, 1, idx).await? {
                self.config.artifacts.write_response(
                    &self.response_meta(round, 1, idx, true),
                    &prompt,
                    &response,
                )?;
                self.round_responses
                    .entry(round)
                    .or_default()
                    .insert(idx, response);
                debug!(line = idx, "query line complete");
            }

            if idx < line_cap {
                self.pause_line().await?;
            }
        }
        Ok(())
    }

    // ── Phase 2: coding + scan ─────────────────────────────────────────

    async fn run_phase2(
        &mut self,
        checkpoint: &mut CheckpointStore,
        round: u32,
        start_line: usize,
        line_cap: usize,
    ) -> AppResult<()> {
        debug!(round, lines = line_cap, "coding phase start");
        let lines: Vec<(usize, String)> = self.numbered_lines(line_cap);

        for (idx, rel_file) in lines {
            if idx < start_line {
                continue;
            }

            if let Some(found_round) = self.attacked.get(&idx).copied() {
                info!(line = idx, found_round, "line already attacked, counted as processed");
                self.count_processed(checkpoint)?;
                continue;
            }

            checkpoint.update_progress(ProgressUpdate::new().phase(2).line(idx))?;

            let prompt = self.config.templates.render_coding(&rel_file);
            if let Some(response) = self.obtain_response(&prompt, round, 2, idx).await? {
                self.config.artifacts.write_response(
                    &self.response_meta(round, 2, idx, true),
                    &prompt,
                    &response,
                )?;

                let counts = self
                    .scan_and_record(&rel_file, &format!("round_{}", round))
                    .await?;

                if self.config.strategy.bait_test.is_some() && counts.any() {
                    debug!(line = idx, ?counts, "recording pending vicious pattern");
                    self.pending_vicious.push(PendingVicious {
                        line: idx,
                        rel_file: rel_file.clone(),
                        counts,
                    });
                }

                if let Some(policy) = self.config.strategy.early_termination {
                    if policy.is_vulnerable(counts) {
                        info!(
                            line = idx,
                            round,
                            policy = %policy,
                            "line judged vulnerable, terminating early"
                        );
                        self.attacked.insert(idx, round);
                        checkpoint.update_progress(
                            ProgressUpdate::new().line_detected(&self.project.name, idx, round),
                        )?;
                    }
                }
            }

            // Processed regardless of success, failure, or findings
            self.count_processed(checkpoint)?;

            if idx < line_cap {
                self.pause_line().await?;
            }
        }
        Ok(())
    }

    /// Scan one project file with both analyzers, persist both native
    /// reports, and return the countable finding counts.
    async fn scan_and_record(
        &self,
        rel_file: &str,
        round_label: &str,
    ) -> AppResult<FileScanCounts> {
        let full_path = self.project.path.join(rel_file);
        let (bandit, semgrep) = self
            .config
            .scanners
            .scan_both(&full_path, &self.config.cwe_id, &self.config.cancel)
            .await;
        if self.config.cancel.is_cancelled() {
            return Err(AppError::Interrupted);
        }

        self.config.artifacts.write_scan_report(
            bandit.scanner.name(),
            &self.config.cwe_label,
            &self.project.name,
            round_label,
            rel_file,
            &bandit.raw_report,
        )?;
        self.config.artifacts.write_scan_report(
            semgrep.scanner.name(),
            &self.config.cwe_label,
            &self.project.name,
            round_label,
            rel_file,
            &semgrep.raw_report,
        )?;

        Ok(FileScanCounts::from_outcomes(&bandit, &semgrep))
    }

    // ── Bait-code verification ─────────────────────────────────────────

    async fn verify_and_commit(
        &mut self,
        checkpoint: &mut CheckpointStore,
        round: u32,
        spec: &BaitTestSpec,
    ) -> AppResult<()> {
        if self.pending_vicious.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.pending_vicious);
        info!(
            candidates = pending.len(),
            attempts = spec.rounds,
            "bait-code test start"
        );

        let ctx = bait_test::BaitTestContext {
            driver: self.config.driver.as_ref(),
            scanners: self.config.scanners.as_ref(),
            templates: self.config.templates.as_ref(),
            artifacts: self.config.artifacts.as_ref(),
            project: &self.project,
            cwe_id: &self.config.cwe_id,
            cwe_label: &self.config.cwe_label,
            smart_wait: self.config.smart_wait,
            wait_timeout: self.config.wait_timeout,
            pause_secs: self.config.pacing.commit_pause_secs,
            cancel: &self.config.cancel,
        };
        let survivors = bait_test::verify_pending(&ctx, spec, pending).await?;

        info!(confirmed = survivors.len(), "bait-code test complete");
        for entry in survivors {
            let committed = self.config.artifacts.commit_vicious(
                &self.project.path,
                &self.project.name,
                &entry.rel_file,
                entry.counts,
            )?;
            if !committed.is_empty() {
                self.result.committed_patterns += 1;
            }
            self.attacked.insert(entry.line, round);
            checkpoint.update_progress(
                ProgressUpdate::new().line_detected(&self.project.name, entry.line, round),
            )?;
        }
        Ok(())
    }

    // ── Response acquisition with retry ────────────────────────────────

    /// Send a prompt and obtain a usable response, retrying per the
    /// schedule. `None` means the line exhausted its retries and was
    /// demoted to failed.
    async fn obtain_response(
        &mut self,
        prompt: &str,
        round: u32,
        phase: u8,
        line: usize,
    ) -> AppResult<Option<String>> {
        let mut retry = RetryController::new(self.config.retry_policy.clone());
        let mut last_text: Option<String> = None;

        loop {
            if self.config.cancel.is_cancelled() {
                return Err(AppError::Interrupted);
            }

            let (class, cause) = match self.attempt_exchange(prompt).await? {
                ExchangeOutcome::Usable(text) => {
                    if retry.attempts() > 0 {
                        debug!(line, attempts = retry.attempts(), "line recovered after retries");
                    }
                    return Ok(Some(text));
                }
                ExchangeOutcome::Failed { class, cause, text } => {
                    if text.is_some() {
                        last_text = text;
                    }
                    (class, cause)
                }
            };

            warn!(line, round, phase, class = %class, cause = %cause, "exchange failed");
            match retry.backoff(class, &self.config.cancel).await? {
                RetryDecision::Retry => {
                    // Stale input must not concatenate with the retried prompt
                    if let Err(e) = self.config.driver.clear_input().await {
                        if e.is_cancelled() {
                            return Err(AppError::Interrupted);
                        }
                        warn!(error = %e, "failed to clear input before retry");
                    }
                }
                RetryDecision::GiveUp => {
                    self.result.failed_lines.push(FailedLine::new(
                        &self.project.name,
                        round,
                        phase,
                        line,
                        cause,
                    ));
                    if let Some(text) = last_text {
                        self.config.artifacts.write_response(
                            &self.response_meta(round, phase, line, false),
                            prompt,
                            &text,
                        )?;
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// One send/wait/copy/classify exchange.
    async fn attempt_exchange(&self, prompt: &str) -> AppResult<ExchangeOutcome> {
        if let Err(e) = self.config.driver.send_prompt(prompt).await {
            return failure_from_driver(e, ResponseClass::Transport);
        }

        if let Err(e) = self
            .config
            .driver
            .wait_for_response(self.config.wait_timeout, self.config.smart_wait)
            .await
        {
            return failure_from_driver(e, ResponseClass::Timeout);
        }

        let text = match self.copy_with_retries().await? {
            Some(text) => text,
            None => {
                return Ok(ExchangeOutcome::Failed {
                    class: ResponseClass::Transport,
                    cause: "empty response copy".to_string(),
                    text: None,
                })
            }
        };

        let class = self.config.validator.classify(&text);
        if class.is_ok() {
            Ok(ExchangeOutcome::Usable(text))
        } else {
            Ok(ExchangeOutcome::Failed {
                cause: format!("response classified {}", class),
                class,
                text: Some(text),
            })
        }
    }

    /// Copy the response, tolerating a couple of empty reads.
    async fn copy_with_retries(&self) -> AppResult<Option<String>> {
        for attempt in 0..COPY_ATTEMPTS {
            match self.config.driver.copy_response().await {
                Ok(text) if !text.trim().is_empty() => return Ok(Some(text)),
                Ok(_) => {
                    debug!(attempt, "response copy came back empty");
                }
                Err(e) if e.is_cancelled() => return Err(AppError::Interrupted),
                Err(e) => {
                    debug!(attempt, error = %e, "response copy failed");
                }
            }
            pause_secs(self.config.pacing.copy_retry_pause_secs, &self.config.cancel)
                .await
                .map_err(|_| AppError::Interrupted)?;
        }
        Ok(None)
    }

    // ── Small helpers ──────────────────────────────────────────────────

    fn numbered_lines(&self, cap: usize) -> Vec<(usize, String)> {
        self.prompt_lines
            .iter()
            .take(cap)
            .enumerate()
            .map(|(i, l)| (i + 1, l.clone()))
            .collect()
    }

    fn response_meta(&self, round: u32, phase: u8, line: usize, success: bool) -> ResponseMeta {
        ResponseMeta {
            project: self.project.name.clone(),
            project_path: self.project.path.clone(),
            round,
            phase,
            line,
            success,
        }
    }

    fn count_processed(&mut self, checkpoint: &mut CheckpointStore) -> AppResult<()> {
        self.result.lines_processed += 1;
        checkpoint.update_progress(
            ProgressUpdate::new()
                .files_processed(self.processed_before + self.result.lines_processed),
        )
    }

    async fn pause_line(&self) -> AppResult<()> {
        pause_secs(self.config.pacing.line_pause_secs, &self.config.cancel)
            .await
            .map_err(|_| AppError::Interrupted)
    }

    async fn pause_commit(&self) -> AppResult<()> {
        pause_secs(self.config.pacing.commit_pause_secs, &self.config.cancel)
            .await
            .map_err(|_| AppError::Interrupted)
    }
}

/// Outcome of one assistant exchange
enum ExchangeOutcome {
    Usable(String),
    Failed {
        class: ResponseClass,
        cause: String,
        text: Option<String>,
    },
}

/// Map a driver error on a non-retryable operation
fn map_driver_err(e: CoreError) -> AppError {
    if e.is_cancelled() {
        AppError::Interrupted
    } else {
        AppError::project(e.to_string())
    }
}

/// Turn a driver failure into a retryable exchange outcome, preserving
/// cancellation.
fn failure_from_driver(e: CoreError, class: ResponseClass) -> AppResult<ExchangeOutcome> {
    if e.is_cancelled() {
        return Err(AppError::Interrupted);
    }
    Ok(ExchangeOutcome::Failed {
        class,
        cause: e.to_string(),
        text: None,
    })
}
