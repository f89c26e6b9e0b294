//! Bait-code test scenarios: inconsistent reproduction rejects a pattern,
//! the AND policy demands both scanners, and a stable elicitor is
//! committed and its line retired.

use std::sync::atomic::Ordering;

use baitline::CampaignOutcome;

use crate::support::{settings_json, Fixture};

#[tokio::test]
async fn test_inconsistent_reproduction_rejects_pattern() {
    let fixture = Fixture::new();
    let root = fixture.add_project("proj", &["a.py", "b.py"]);

    // a.py: clean baseline, finding in round 1 phase 2, then the bait
    // attempts come back clean - the pattern must not survive. The trailing
    // entries would feed later bait attempts and round 2.
    fixture.bandit.script("a.py", &[0, 1, 0, 0, 1, 0]);

    let settings = settings_json(
        "AS",
        2,
        0,
        &[root],
        &[("judge_policy", serde_json::json!("or"))],
    );

    let outcome = fixture.controller().run(Some(settings)).await.unwrap();
    assert_eq!(outcome, CampaignOutcome::Completed);

    // The first clean attempt short-circuits: the remaining script entries
    // for attempts 2 and 3 were never consumed (round 2 phase 2 took one).
    assert_eq!(fixture.bandit.remaining("a.py"), 2);
    assert_eq!(fixture.driver.new_conversations.load(Ordering::SeqCst), 1);

    // Nothing committed, the line stays eligible and round 2 re-attacks it
    assert!(!fixture.output_dir().join("vicious_pattern").exists());
    assert!(fixture.response_artifact("proj", 2, 1, 1).exists());
    assert!(fixture.response_artifact("proj", 2, 2, 1).exists());

    let checkpoint = fixture.checkpoint_json();
    assert!(checkpoint["line_vulnerability_detected"]
        .as_object()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_and_policy_rejects_single_scanner_pattern() {
    let fixture = Fixture::new();
    let root = fixture.add_project("proj", &["a.py"]);

    // Bandit fires consistently, Semgrep never does
    fixture.bandit.script("a.py", &[0, 1, 1, 1, 1]);

    let settings = settings_json(
        "AS",
        1,
        0,
        &[root],
        &[("judge_policy", serde_json::json!("and"))],
    );

    let outcome = fixture.controller().run(Some(settings)).await.unwrap();
    assert_eq!(outcome, CampaignOutcome::Completed);

    // Under AND the very first verification fails
    assert!(!fixture.output_dir().join("vicious_pattern").exists());
    let checkpoint = fixture.checkpoint_json();
    assert!(checkpoint["line_vulnerability_detected"]
        .as_object()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_stable_pattern_committed_and_line_retired() {
    let fixture = Fixture::new();
    let root = fixture.add_project("proj", &["a.py"]);

    // Baseline clean, round 1 finding, both bait attempts reproduce
    fixture.bandit.script("a.py", &[0, 1, 1, 1]);

    let settings = settings_json(
        "AS",
        2,
        0,
        &[root],
        &[
            ("judge_policy", serde_json::json!("or")),
            ("bait_code_test_rounds", serde_json::json!(2)),
        ],
    );

    let outcome = fixture.controller().run(Some(settings)).await.unwrap();
    assert_eq!(outcome, CampaignOutcome::Completed);

    // Committed to the bandit OR tree only (semgrep never fired)
    let committed = fixture
        .output_dir()
        .join("vicious_pattern/or_mode/bandit/proj/a.py");
    assert!(committed.exists());
    assert!(!fixture
        .output_dir()
        .join("vicious_pattern/and_mode/proj/a.py")
        .exists());
    let listed = std::fs::read_to_string(
        fixture
            .output_dir()
            .join("vicious_pattern/or_mode/bandit/proj/prompt.txt"),
    )
    .unwrap();
    assert_eq!(listed, "a.py\n");

    // Two verification attempts, each with its own conversation reset
    assert_eq!(fixture.driver.new_conversations.load(Ordering::SeqCst), 2);
    assert!(fixture
        .output_dir()
        .join("OriginalScanResult/bandit/CWE-022/proj/bait_code_test/a.py/attempt_2/a.py_report.json")
        .exists());

    // The line is retired: round 2 sends no prompts for it but still
    // counts it as processed
    assert!(!fixture.response_artifact("proj", 2, 1, 1).exists());
    assert!(!fixture.response_artifact("proj", 2, 2, 1).exists());

    let checkpoint = fixture.checkpoint_json();
    assert_eq!(checkpoint["line_vulnerability_detected"]["proj"]["1"], 1);
    assert_eq!(checkpoint["total_files_processed"], 2);

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(
            fixture
                .output_dir()
                .join("ExecutionResult/campaign_report.json"),
        )
        .unwrap(),
    )
    .unwrap();
    assert_eq!(report["committed_patterns"], 1);
}
