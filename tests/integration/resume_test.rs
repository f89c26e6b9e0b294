//! Crash/resume scenarios: an interrupted checkpoint re-enters mid-phase
//! with settings taken verbatim, without re-running the baseline scan or
//! duplicating work.

use baitline::storage::checkpoint::{CheckpointStore, ProgressUpdate};
use baitline::CampaignOutcome;

use crate::support::{settings_json, Fixture};

#[tokio::test]
async fn test_resume_reenters_phase2_at_stored_line() {
    let fixture = Fixture::new();
    let root = fixture.add_project("proj", &["a.py", "b.py"]);

    // Sentinel script: if the baseline ran again it would consume this
    fixture.bandit.script("a.py", &[99]);

    let settings = settings_json("AS", 1, 0, &[root], &[]);

    // Forge the state a crash during round 1 phase 2 line 2 leaves behind:
    // line 1 already processed, baseline done, process killed.
    {
        let mut store =
            CheckpointStore::open(fixture.output_dir().join("checkpoint.json")).unwrap();
        store.create(&settings, vec!["proj".to_string()]).unwrap();
        store
            .update_progress(
                ProgressUpdate::new()
                    .project(0, "proj")
                    .baseline_completed("proj")
                    .round(1)
                    .phase(2)
                    .line(2)
                    .files_processed(1),
            )
            .unwrap();
        store.mark_interrupted().unwrap();
    }

    // Resume without fresh settings: everything comes from the checkpoint
    let outcome = fixture.controller().run(None).await.unwrap();
    assert_eq!(outcome, CampaignOutcome::Completed);

    // Only the in-flight line was re-attempted: one coding prompt, no
    // query-phase prompts at all
    assert_eq!(fixture.driver.sent_prompts(), 1);
    assert_eq!(fixture.driver.prompts_mentioning("b.py"), 1);
    assert_eq!(fixture.driver.prompts_mentioning("a.py"), 0);

    // Baseline was not re-run
    assert_eq!(fixture.bandit.remaining("a.py"), 1);

    // Counter picked up where it left off: one unit before + one line now
    let checkpoint = fixture.checkpoint_json();
    assert_eq!(checkpoint["total_files_processed"], 2);
    assert_eq!(checkpoint["status"], "completed");

    // No pattern state was invented during the replayed phase
    assert!(!fixture.output_dir().join("vicious_pattern").exists());

    let store = CheckpointStore::open(fixture.output_dir().join("checkpoint.json")).unwrap();
    assert!(store.get_resume_info().is_none());
}

#[tokio::test]
async fn test_resume_skips_completed_projects() {
    let fixture = Fixture::new();
    let root_a = fixture.add_project("alpha", &["a.py"]);
    let root_b = fixture.add_project("beta", &["b.py"]);

    let settings = settings_json("RAW", 1, 0, &[root_a, root_b], &[]);

    {
        let mut store =
            CheckpointStore::open(fixture.output_dir().join("checkpoint.json")).unwrap();
        store
            .create(&settings, vec!["alpha".to_string(), "beta".to_string()])
            .unwrap();
        store
            .update_progress(
                ProgressUpdate::new()
                    .project(1, "beta")
                    .completed_project("alpha")
                    .files_processed(1)
                    .reset_position(),
            )
            .unwrap();
        store.mark_interrupted().unwrap();
    }

    let outcome = fixture.controller().run(None).await.unwrap();
    assert_eq!(outcome, CampaignOutcome::Completed);

    // Alpha was never touched again
    assert_eq!(fixture.driver.prompts_mentioning("a.py"), 0);
    // Beta ran its full single round (query + coding)
    assert_eq!(fixture.driver.prompts_mentioning("b.py"), 2);

    let checkpoint = fixture.checkpoint_json();
    assert_eq!(checkpoint["total_files_processed"], 2);
}

#[tokio::test]
async fn test_completed_checkpoint_requires_fresh_settings() {
    let fixture = Fixture::new();
    let root = fixture.add_project("proj", &["a.py"]);
    let settings = settings_json("RAW", 1, 0, &[root], &[]);

    {
        let mut store =
            CheckpointStore::open(fixture.output_dir().join("checkpoint.json")).unwrap();
        store.create(&settings, vec!["proj".to_string()]).unwrap();
        store.mark_completed().unwrap();
    }

    // A completed campaign is not resumable; running without settings is a
    // configuration error
    let result = fixture.controller().run(None).await;
    assert!(result.is_err());
}
