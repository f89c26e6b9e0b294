//! Editor Bridge Driver
//!
//! `EditorDriver` implementation that shells out to an external automation
//! helper - the process that actually owns keystrokes, clipboard and window
//! focus. Each operation maps to one helper invocation:
//!
//! ```text
//! <bridge> open-project <path>
//! <bridge> close-project
//! <bridge> send-prompt            (prompt text on stdin)
//! <bridge> copy-response          (response text on stdout)
//! <bridge> clear-input
//! <bridge> commit keep|revert
//! <bridge> undo-pending           (prints "pending" while the undo
//!                                  confirmation dialog is still up)
//! <bridge> new-conversation
//! ```
//!
//! The smart wait polls `copy-response` until the text has been stable for
//! three consecutive 1.5 s polls, at least 3 s total, and is at least 100
//! characters long. On timeout a partial response above a minimal length is
//! accepted, matching the assistant's habit of settling slowly.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use baitline_core::{sleep_cancellable, CancellationToken, CommitAction, CoreError, CoreResult, EditorDriver};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Poll interval of the smart wait
const POLL_INTERVAL: Duration = Duration::from_millis(1500);
/// Consecutive unchanged polls required
const REQUIRED_STABLE_POLLS: u32 = 3;
/// Minimum total stable time
const MIN_STABLE_SECS: f64 = 3.0;
/// Minimum response length for the smart wait to finish
const MIN_RESPONSE_LEN: usize = 100;
/// Grace period before the first poll
const INITIAL_GRACE: Duration = Duration::from_secs(2);
/// Partial responses longer than this are accepted on timeout
const PARTIAL_ACCEPT_LEN: usize = 50;
/// Cap on fixed (non-smart) waits
const FIXED_WAIT_CAP: Duration = Duration::from_secs(60);
/// Re-issued undos while the confirmation dialog stays up
const MAX_UNDO_RETRIES: u32 = 5;

/// Subprocess-backed editor driver
pub struct BridgeEditorDriver {
    command: String,
    cancel: CancellationToken,
}

impl BridgeEditorDriver {
    /// Driver invoking `command` for every operation
    pub fn new(command: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            command: command.into(),
            cancel,
        }
    }

    /// Run one bridge invocation, optionally feeding stdin, returning stdout.
    async fn run_bridge(&self, args: &[&str], stdin: Option<&str>) -> CoreResult<String> {
        debug!(bridge = %self.command, ?args, "invoking editor bridge");

        let mut cmd = Command::new(&self.command);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::config(format!(
                    "editor bridge '{}' not found; configure --bridge with the automation helper",
                    self.command
                ))
            } else {
                CoreError::driver(format!("failed to spawn editor bridge: {}", e))
            }
        })?;

        if let Some(input) = stdin {
            if let Some(mut handle) = child.stdin.take() {
                handle
                    .write_all(input.as_bytes())
                    .await
                    .map_err(|e| CoreError::driver(format!("failed to write prompt: {}", e)))?;
            }
        }

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let status = tokio::select! {
            _ = self.cancel.cancelled() => {
                let _ = child.start_kill();
                return Err(CoreError::Cancelled);
            }
            status = child.wait() => status
                .map_err(|e| CoreError::driver(format!("editor bridge failed: {}", e)))?,
        };

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        if let Some(mut out) = stdout_pipe.take() {
            let _ = out.read_to_end(&mut stdout_buf).await;
        }
        if let Some(mut err) = stderr_pipe.take() {
            let _ = err.read_to_end(&mut stderr_buf).await;
        }

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_buf);
            return Err(CoreError::driver(format!(
                "bridge {:?} exited with {}: {}",
                args,
                status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&stdout_buf).into_owned())
    }

    /// The stability-window wait over repeated response reads.
    async fn smart_wait(&self, timeout: Duration) -> CoreResult<()> {
        let start = Instant::now();

        if !sleep_cancellable(INITIAL_GRACE, &self.cancel).await {
            return Err(CoreError::Cancelled);
        }

        let mut last_text = String::new();
        let mut stable_polls = 0u32;
        let mut last_change = Instant::now();

        while start.elapsed() < timeout {
            if self.cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let current = self
                .run_bridge(&["copy-response"], None)
                .await
                .unwrap_or_default();

            if !current.is_empty() && current == last_text {
                stable_polls += 1;
                let stable_secs = last_change.elapsed().as_secs_f64();
                debug!(
                    stable_polls,
                    stable_secs,
                    len = current.len(),
                    "response stability check"
                );
                if stable_polls >= REQUIRED_STABLE_POLLS
                    && current.trim().len() >= MIN_RESPONSE_LEN
                    && stable_secs >= MIN_STABLE_SECS
                {
                    info!(
                        elapsed_secs = start.elapsed().as_secs_f64(),
                        len = current.len(),
                        "response stable, wait complete"
                    );
                    return Ok(());
                }
            } else {
                stable_polls = 0;
                last_change = Instant::now();
                last_text = current;
            }

            if !sleep_cancellable(POLL_INTERVAL, &self.cancel).await {
                return Err(CoreError::Cancelled);
            }
        }

        // Timed out. A settled partial response is still worth copying.
        if last_text.trim().len() > PARTIAL_ACCEPT_LEN {
            warn!(
                len = last_text.len(),
                "wait timed out with partial response, accepting"
            );
            return Ok(());
        }
        Err(CoreError::driver(format!(
            "response wait timed out after {:?}",
            timeout
        )))
    }
}

#[async_trait]
impl EditorDriver for BridgeEditorDriver {
    async fn open_project(&self, path: &Path) -> CoreResult<()> {
        info!(project = %path.display(), "opening project");
        self.run_bridge(&["open-project", &path.to_string_lossy()], None)
            .await?;
        Ok(())
    }

    async fn close_project(&self) -> CoreResult<()> {
        info!("closing project");
        self.run_bridge(&["close-project"], None).await?;
        Ok(())
    }

    async fn send_prompt(&self, text: &str) -> CoreResult<()> {
        debug!(bytes = text.len(), "sending prompt");
        self.run_bridge(&["send-prompt"], Some(text)).await?;
        Ok(())
    }

    async fn wait_for_response(&self, timeout: Duration, smart: bool) -> CoreResult<()> {
        if smart {
            self.smart_wait(timeout).await
        } else {
            let wait = timeout.min(FIXED_WAIT_CAP);
            if sleep_cancellable(wait, &self.cancel).await {
                Ok(())
            } else {
                Err(CoreError::Cancelled)
            }
        }
    }

    async fn copy_response(&self) -> CoreResult<String> {
        self.run_bridge(&["copy-response"], None).await
    }

    async fn clear_input(&self) -> CoreResult<()> {
        self.run_bridge(&["clear-input"], None).await?;
        Ok(())
    }

    async fn commit(&self, action: CommitAction) -> CoreResult<()> {
        info!(action = %action, "committing assistant edits");
        self.run_bridge(&["commit", action.as_str()], None).await?;

        if action == CommitAction::Revert {
            // The undo confirmation dialog sometimes swallows the first
            // undo; re-issue it while the bridge still reports it pending.
            for attempt in 0..MAX_UNDO_RETRIES {
                let pending = self
                    .run_bridge(&["undo-pending"], None)
                    .await
                    .map(|out| out.trim() == "pending")
                    .unwrap_or(false);
                if !pending {
                    break;
                }
                warn!(attempt, "undo confirmation still pending, re-issuing revert");
                self.run_bridge(&["commit", "revert"], None).await?;
                if !sleep_cancellable(Duration::from_secs(1), &self.cancel).await {
                    return Err(CoreError::Cancelled);
                }
            }
        }
        Ok(())
    }

    async fn new_conversation(&self) -> CoreResult<()> {
        debug!("starting new conversation");
        self.run_bridge(&["new-conversation"], None).await?;
        Ok(())
    }
}
