//! Baitline - Rust Backend Library
//!
//! Red-team campaign orchestrator for LLM code assistants. Baitline drives
//! an assistant (through an external editor-automation bridge) against
//! target projects in repeated two-phase rounds, scans the induced code
//! with two static analyzers, verifies repeatability with the bait-code
//! test, and persists reproducible vicious-pattern corpora.
//!
//! Library layout:
//! - `models` - settings, project and report records
//! - `services` - templates, validation, retry, editor bridge, engine,
//!   controller, artifacts, baseline and all-safe passes
//! - `storage` - checkpoint document and output layout
//! - `utils` - application error type

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export the high-level surface used by the binary and tests
pub use models::settings::{CampaignSettings, Mode};
pub use services::campaign::{CampaignController, CampaignOutcome};
pub use services::engine::{EngineConfig, EnginePacing, ModeStrategy, ResumePoint, RoundEngine};
pub use storage::checkpoint::{CampaignStatus, CheckpointStore};
pub use storage::paths::OutputLayout;
pub use utils::error::{AppError, AppResult};
