//! Integration test suite
//!
//! End-to-end campaign scenarios driven through scripted editor-driver and
//! scanner doubles. Compiled as a single test target.

mod support;

mod bait_flow_test;
mod budget_test;
mod early_termination_test;
mod resume_test;
