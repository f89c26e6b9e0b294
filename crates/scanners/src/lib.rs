//! Baitline Scanners
//!
//! Static-analyzer invocation and vulnerability judging for the Baitline
//! workspace. The campaign engine hands a target file and a CWE id to this
//! crate and gets back per-scanner finding counts plus the analyzers'
//! native JSON reports, captured verbatim for the artifact tree.
//!
//! ## Module Organization
//!
//! - `models` - Finding/outcome data structures (`Finding`, `ScanOutcome`, `FileScanCounts`)
//! - `runner` - Subprocess scanner invocation (`Scanner`, `CommandScanner`, `ScannerPair`)
//! - `judge` - OR/AND vulnerability judgment (`JudgePolicy`)
//!
//! Analyzers are opaque external tools: a crashed process or an unparsable
//! report never fails the round, it just contributes zero findings.

pub mod judge;
pub mod models;
pub mod runner;

pub use judge::JudgePolicy;
pub use models::{FileScanCounts, Finding, ScanOutcome, ScanStatus, ScannerKind};
pub use runner::{CommandScanner, Scanner, ScannerPair};
