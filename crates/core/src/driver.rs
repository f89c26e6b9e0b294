//! Editor Automation Contract
//!
//! The campaign engine never touches the host editor directly. Every
//! interaction with the assistant (opening a project, sending a prompt,
//! reading the response text, keeping or reverting the assistant's pending
//! edits) goes through the `EditorDriver` trait, implemented by the
//! external automation bridge in the application crate and by scripted
//! doubles in tests.
//!
//! All operations are fallible and possibly long-running. Implementations
//! must honor the cancellation token they were constructed with and return
//! `CoreError::Cancelled` from any wait that is aborted.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// What to do with the assistant's pending edits when the conversation is
/// reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitAction {
    /// Accept the pending edits into the project tree
    Keep,
    /// Undo the pending edits, restoring the on-disk originals
    Revert,
}

impl CommitAction {
    /// Stable string form, used for the bridge subcommand and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitAction::Keep => "keep",
            CommitAction::Revert => "revert",
        }
    }
}

impl std::fmt::Display for CommitAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract for the host-editor automation bridge.
///
/// The engine treats the editor and the assistant behind it as a single
/// exclusive resource: no two operations are ever issued concurrently.
#[async_trait]
pub trait EditorDriver: Send + Sync {
    /// Open a project directory in the editor. Must complete before any
    /// prompt is sent for that project.
    async fn open_project(&self, path: &Path) -> CoreResult<()>;

    /// Close the currently open project. Also called on error paths.
    async fn close_project(&self) -> CoreResult<()>;

    /// Transport a prompt to the assistant's chat input and submit it.
    async fn send_prompt(&self, text: &str) -> CoreResult<()>;

    /// Block until the assistant's response is complete.
    ///
    /// With `smart` enabled the implementation returns only once the
    /// response text has been stable for at least three consecutive polls
    /// 1.5 s apart, stable for at least 3 s total, and is at least 100
    /// characters long. Without it, a fixed grace period bounded by
    /// `timeout` is used.
    async fn wait_for_response(&self, timeout: Duration, smart: bool) -> CoreResult<()>;

    /// Read the assistant's latest response text. An empty string means the
    /// copy failed and the caller should retry.
    async fn copy_response(&self) -> CoreResult<String>;

    /// Clear the chat input area so a retried prompt does not concatenate
    /// with stale text.
    async fn clear_input(&self) -> CoreResult<()>;

    /// Apply `keep` or `revert` to the assistant's pending edits. A revert
    /// must also dismiss the editor's undo confirmation dialog, re-issuing
    /// the undo until the confirmation indicator disappears.
    async fn commit(&self, action: CommitAction) -> CoreResult<()>;

    /// Clear the assistant's short-term memory by starting a new
    /// conversation.
    async fn new_conversation(&self) -> CoreResult<()>;
}
