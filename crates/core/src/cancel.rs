//! Cooperative Cancellation Helpers
//!
//! The whole campaign runs on a single `CancellationToken` handed down from
//! the binary's ctrl-c handler. Every sleep, wait, and subprocess call is a
//! suspension point that must observe the token; these helpers wrap the
//! `tokio::select!` dance so call sites stay readable.

use std::time::Duration;

pub use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};

/// Sleep for `duration`, waking early if the token is cancelled.
///
/// Returns `true` when the full duration elapsed, `false` when the sleep was
/// cut short by cancellation.
pub async fn sleep_cancellable(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Sleep for a fractional number of seconds, failing with
/// `CoreError::Cancelled` when interrupted.
///
/// Used for the short pacing pauses between lines and after commits, where
/// an interrupt should unwind the current operation.
pub async fn pause_secs(secs: f64, token: &CancellationToken) -> CoreResult<()> {
    if sleep_cancellable(Duration::from_secs_f64(secs), token).await {
        Ok(())
    } else {
        Err(CoreError::Cancelled)
    }
}
