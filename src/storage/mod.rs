//! Storage Layer
//!
//! Durable campaign state (checkpoint document) and the on-disk output
//! layout shared by every artifact writer.

pub mod checkpoint;
pub mod paths;

pub use checkpoint::{CampaignStatus, CheckpointDoc, CheckpointStore, Progress, ProgressUpdate, ResumeInfo};
pub use paths::OutputLayout;
