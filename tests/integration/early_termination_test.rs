//! RAW-mode early termination: a line judged vulnerable stops receiving
//! prompts but keeps counting toward the processed total every round.

use baitline::CampaignOutcome;

use crate::support::{settings_json, Fixture};

#[tokio::test]
async fn test_detected_line_is_skipped_but_counted() {
    let fixture = Fixture::new();
    let root = fixture.add_project("proj", &["a.py", "b.py", "c.py"]);

    // b.py trips both scanners in round 1 phase 2 (AND policy)
    fixture.bandit.script("b.py", &[0, 1]);
    fixture.semgrep.script("b.py", &[0, 1]);

    let settings = settings_json(
        "RAW",
        3,
        0,
        &[root],
        &[
            ("early_termination_enabled", serde_json::json!(true)),
            ("early_termination_policy", serde_json::json!("and")),
        ],
    );

    let outcome = fixture.controller().run(Some(settings)).await.unwrap();
    assert_eq!(outcome, CampaignOutcome::Completed);

    // Detection recorded with the round it first happened in
    let checkpoint = fixture.checkpoint_json();
    assert_eq!(checkpoint["line_vulnerability_detected"]["proj"]["2"], 1);

    // b.py was prompted only in round 1 (one query + one coding prompt)
    assert_eq!(fixture.driver.prompts_mentioning("b.py"), 2);
    // The other lines ran all three rounds
    assert_eq!(fixture.driver.prompts_mentioning("a.py"), 6);
    assert_eq!(fixture.driver.prompts_mentioning("c.py"), 6);

    // No artifacts for the retired line after round 1
    for round in 2..=3 {
        assert!(!fixture.response_artifact("proj", round, 1, 2).exists());
        assert!(!fixture.response_artifact("proj", round, 2, 2).exists());
    }
    assert!(fixture.response_artifact("proj", 1, 2, 2).exists());

    // Skipped rounds still count the line: 3 lines x 3 rounds
    assert_eq!(checkpoint["total_files_processed"], 9);
}

#[tokio::test]
async fn test_or_policy_detects_on_single_scanner() {
    let fixture = Fixture::new();
    let root = fixture.add_project("proj", &["a.py"]);

    // Only semgrep fires
    fixture.semgrep.script("a.py", &[0, 2]);

    let settings = settings_json(
        "RAW",
        2,
        0,
        &[root],
        &[
            ("early_termination_enabled", serde_json::json!(true)),
            ("early_termination_policy", serde_json::json!("or")),
        ],
    );

    fixture.controller().run(Some(settings)).await.unwrap();

    let checkpoint = fixture.checkpoint_json();
    assert_eq!(checkpoint["line_vulnerability_detected"]["proj"]["1"], 1);
    assert_eq!(fixture.driver.prompts_mentioning("a.py"), 2);
    assert_eq!(checkpoint["total_files_processed"], 2);
}

#[tokio::test]
async fn test_disabled_early_termination_keeps_attacking() {
    let fixture = Fixture::new();
    let root = fixture.add_project("proj", &["a.py"]);

    fixture.bandit.script("a.py", &[0, 1, 1]);

    let settings = settings_json("RAW", 2, 0, &[root], &[]);

    fixture.controller().run(Some(settings)).await.unwrap();

    // Findings alone change nothing without the feature enabled
    let checkpoint = fixture.checkpoint_json();
    assert!(checkpoint["line_vulnerability_detected"]
        .as_object()
        .unwrap()
        .is_empty());
    assert_eq!(fixture.driver.prompts_mentioning("a.py"), 4);
}
