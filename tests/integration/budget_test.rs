//! Budget accounting scenarios: quota truncation inside a project, budget
//! spread across projects, and the all-safe lists for the processed slice.

use baitline::{CampaignOutcome, CheckpointStore};

use crate::support::{settings_json, Fixture};

#[tokio::test]
async fn test_budget_truncates_project_and_completes() {
    let fixture = Fixture::new();
    let files: Vec<String> = (0..10).map(|i| format!("src/f{}.py", i)).collect();
    let file_refs: Vec<&str> = files.iter().map(|s| s.as_str()).collect();
    let root = fixture.add_project("alpha", &file_refs);

    let settings = settings_json(
        "RAW",
        3,
        5,
        &[root],
        &[("all_safe_enabled", serde_json::json!(true))],
    );

    let outcome = fixture.controller().run(Some(settings)).await.unwrap();
    assert_eq!(outcome, CampaignOutcome::Completed);

    // Exactly five lines processed, all in round 1
    let checkpoint = fixture.checkpoint_json();
    assert_eq!(checkpoint["status"], "completed");
    assert_eq!(checkpoint["total_files_processed"], 5);

    assert!(fixture.response_artifact("alpha", 1, 1, 5).exists());
    assert!(fixture.response_artifact("alpha", 1, 2, 5).exists());
    assert!(!fixture.response_artifact("alpha", 1, 1, 6).exists());
    assert!(!fixture.response_artifact("alpha", 2, 1, 1).exists());

    // A completed campaign is not resumable
    let store = CheckpointStore::open(fixture.output_dir().join("checkpoint.json")).unwrap();
    assert!(store.get_resume_info().is_none());

    // All three safe lists carry exactly the processed slice
    for label in ["and_mode", "or_mode/bandit", "or_mode/semgrep"] {
        let list = fixture
            .output_dir()
            .join("ExecutionResult/all_safe")
            .join(label)
            .join("alpha/prompt.txt");
        let body = std::fs::read_to_string(&list).unwrap();
        let listed: Vec<&str> = body.lines().collect();
        assert_eq!(listed.len(), 5, "list {} should carry 5 entries", label);
        for file in &files[..5] {
            assert!(listed.contains(&file.as_str()));
        }
    }

    // Final report reflects the budget
    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(
            fixture
                .output_dir()
                .join("ExecutionResult/campaign_report.json"),
        )
        .unwrap(),
    )
    .unwrap();
    assert_eq!(report["total_files_processed"], 5);
    assert_eq!(report["file_budget"], 5);
}

#[tokio::test]
async fn test_budget_spans_projects_with_partial_tail() {
    let fixture = Fixture::new();
    let a_files: Vec<String> = (0..5).map(|i| format!("a{}.py", i)).collect();
    let b_files: Vec<String> = (0..10).map(|i| format!("b{}.py", i)).collect();
    let a_refs: Vec<&str> = a_files.iter().map(|s| s.as_str()).collect();
    let b_refs: Vec<&str> = b_files.iter().map(|s| s.as_str()).collect();
    let root_a = fixture.add_project("alpha", &a_refs);
    let root_b = fixture.add_project("beta", &b_refs);

    let settings = settings_json("RAW", 1, 7, &[root_a, root_b], &[]);

    let outcome = fixture.controller().run(Some(settings)).await.unwrap();
    assert_eq!(outcome, CampaignOutcome::Completed);

    let checkpoint = fixture.checkpoint_json();
    assert_eq!(checkpoint["total_files_processed"], 7);
    assert_eq!(checkpoint["status"], "completed");

    // Alpha fully processed, beta truncated to the remaining two units
    assert!(fixture.response_artifact("alpha", 1, 2, 5).exists());
    assert!(fixture.response_artifact("beta", 1, 2, 2).exists());
    assert!(!fixture.response_artifact("beta", 1, 2, 3).exists());

    let store = CheckpointStore::open(fixture.output_dir().join("checkpoint.json")).unwrap();
    assert!(store.get_resume_info().is_none());

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(
            fixture
                .output_dir()
                .join("ExecutionResult/campaign_report.json"),
        )
        .unwrap(),
    )
    .unwrap();
    assert_eq!(report["project_stats"]["alpha"]["processed_files"], 5);
    assert_eq!(report["project_stats"]["beta"]["processed_files"], 2);
}
