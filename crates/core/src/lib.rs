//! Baitline Core
//!
//! Foundational traits, error types, and cancellation helpers for the
//! Baitline workspace. This crate has zero dependencies on application-level
//! code (campaign orchestration, scanners, storage).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `driver` - Editor automation contract (`EditorDriver`, `CommitAction`)
//! - `cancel` - Cooperative cancellation helpers (`CancellationToken`, cancellable sleeps)
//!
//! ## Design Principles
//!
//! 1. **Minimal dependency surface** - serde/async-trait/thiserror plus tokio timers
//! 2. **Trait-based abstractions** - the editor bridge and test doubles share one contract
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod cancel;
pub mod driver;
pub mod error;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Editor Contract ────────────────────────────────────────────────────
pub use driver::{CommitAction, EditorDriver};

// ── Cancellation ───────────────────────────────────────────────────────
pub use cancel::{pause_secs, sleep_cancellable, CancellationToken};
