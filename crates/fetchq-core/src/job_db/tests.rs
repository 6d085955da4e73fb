//! Tests for job_db (use in-memory DB helper from db).

use crate::job_db::db::open_memory;
use crate::job_db::{
    ClaimOutcome, DeleteOutcome, FlagsUpdate, JobFilter, JobOutcome, JobStatus, NewJob,
};

fn new_job(url: &str) -> NewJob {
    NewJob {
        source_url: url.to_string(),
        notification_chat_id: None,
    }
}

fn outcome(dir: &str) -> JobOutcome {
    JobOutcome {
        title: Some("A Title".to_string()),
        output_dir: dir.to_string(),
        metadata_path: Some(format!("{dir}/metadata.json")),
        description_path: None,
        file_manifest: vec![
            format!("{dir}/clip.webm"),
            format!("{dir}/metadata.json"),
        ],
    }
}

#[tokio::test]
async fn create_job_starts_pending() {
    let db = open_memory().await.unwrap();
    let job = db
        .create_job(&NewJob {
            source_url: "https://example.com/watch?v=1".to_string(),
            notification_chat_id: Some(42),
        })
        .await
        .unwrap();
    assert_eq!(job.id.len(), 32);
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.progress, 0.0);
    assert!(job.file_manifest.is_empty());
    assert_eq!(job.notification_chat_id, Some(42));
    assert!(job.notification_message_id.is_none());
    assert!(!job.watched && !job.starred);

    let fetched = db.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(fetched, job);
    assert!(db.get_job("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn claim_pending_is_idempotent() {
    let db = open_memory().await.unwrap();
    let job = db.create_job(&new_job("https://a.com/1")).await.unwrap();

    match db.claim_pending(&job.id).await.unwrap() {
        ClaimOutcome::Claimed(j) => {
            assert_eq!(j.status, JobStatus::Running);
            assert_eq!(j.progress, 0.0);
        }
        other => panic!("expected Claimed, got {other:?}"),
    }
    assert_eq!(
        db.claim_pending(&job.id).await.unwrap(),
        ClaimOutcome::NotPending(JobStatus::Running)
    );
    assert_eq!(
        db.claim_pending("nope").await.unwrap(),
        ClaimOutcome::Missing
    );
}

#[tokio::test]
async fn progress_is_clamped_and_only_for_running_jobs() {
    let db = open_memory().await.unwrap();
    let job = db.create_job(&new_job("https://a.com/1")).await.unwrap();

    // Not running yet: ignored.
    assert!(!db.set_progress(&job.id, 50.0).await.unwrap());

    db.claim_pending(&job.id).await.unwrap();
    assert!(db.set_progress(&job.id, 150.0).await.unwrap());
    assert_eq!(db.get_job(&job.id).await.unwrap().unwrap().progress, 100.0);
    assert!(db.set_progress(&job.id, -3.0).await.unwrap());
    assert_eq!(db.get_job(&job.id).await.unwrap().unwrap().progress, 0.0);
    assert!(db.set_progress(&job.id, f64::NAN).await.unwrap());
    assert_eq!(db.get_job(&job.id).await.unwrap().unwrap().progress, 0.0);
    assert!(db.set_progress(&job.id, 37.5).await.unwrap());
    assert_eq!(db.get_job(&job.id).await.unwrap().unwrap().progress, 37.5);
}

#[tokio::test]
async fn completed_then_failed_keeps_completed() {
    let db = open_memory().await.unwrap();
    let job = db.create_job(&new_job("https://a.com/1")).await.unwrap();
    db.claim_pending(&job.id).await.unwrap();

    let done = db
        .mark_completed(&job.id, &outcome("A_Title"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100.0);
    assert_eq!(done.output_dir.as_deref(), Some("A_Title"));
    assert_eq!(done.file_manifest.len(), 2);
    assert!(done.error.is_none());

    assert!(db.mark_failed(&job.id, "late fault").await.unwrap().is_none());
    let job = db.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error.is_none());
}

#[tokio::test]
async fn mark_failed_records_error() {
    let db = open_memory().await.unwrap();
    let job = db.create_job(&new_job("https://a.com/1")).await.unwrap();
    // Only a claimed job can fail.
    assert!(db.mark_failed(&job.id, "too early").await.unwrap().is_none());
    assert_eq!(
        db.get_job(&job.id).await.unwrap().unwrap().status,
        JobStatus::Pending
    );
    db.claim_pending(&job.id).await.unwrap();
    let failed = db
        .mark_failed(&job.id, "ERROR: Unsupported URL")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("ERROR: Unsupported URL"));
    // Cannot complete a failed job.
    assert!(db
        .mark_completed(&job.id, &outcome("x"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn recovery_resets_running_and_requeues_pending() {
    let db = open_memory().await.unwrap();
    let pending = db.create_job(&new_job("https://a.com/p")).await.unwrap();
    let running = db.create_job(&new_job("https://a.com/r")).await.unwrap();
    let done = db.create_job(&new_job("https://a.com/d")).await.unwrap();

    db.claim_pending(&running.id).await.unwrap();
    db.set_progress(&running.id, 42.0).await.unwrap();
    // Leftovers of an interrupted run.
    sqlx::query(
        r#"
        UPDATE jobs
        SET output_dir = 'partial',
            metadata_path = 'partial/metadata.json',
            description_path = 'partial/description.txt',
            file_manifest = '["partial/clip.webm"]',
            error = 'stale'
        WHERE id = ?1
        "#,
    )
    .bind(&running.id)
    .execute(&db.pool)
    .await
    .unwrap();
    let seeded = db.get_job(&running.id).await.unwrap().unwrap();
    assert_eq!(seeded.output_dir.as_deref(), Some("partial"));
    assert_eq!(seeded.file_manifest, vec!["partial/clip.webm".to_string()]);
    assert_eq!(seeded.error.as_deref(), Some("stale"));
    db.claim_pending(&done.id).await.unwrap();
    db.mark_completed(&done.id, &outcome("done")).await.unwrap();

    let ids = db.recover_incomplete_jobs().await.unwrap();
    assert_eq!(ids, vec![pending.id.clone(), running.id.clone()]);

    let reset = db.get_job(&running.id).await.unwrap().unwrap();
    assert_eq!(reset.status, JobStatus::Pending);
    assert_eq!(reset.progress, 0.0);
    assert!(reset.output_dir.is_none());
    assert!(reset.metadata_path.is_none());
    assert!(reset.description_path.is_none());
    assert!(reset.file_manifest.is_empty());
    assert!(reset.error.is_none());

    let untouched = db.get_job(&pending.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, JobStatus::Pending);
    assert_eq!(
        db.get_job(&done.id).await.unwrap().unwrap().status,
        JobStatus::Completed
    );
}

#[tokio::test]
async fn list_jobs_newest_first_with_filters() {
    let db = open_memory().await.unwrap();
    let one = db.create_job(&new_job("https://a.com/one")).await.unwrap();
    let two = db.create_job(&new_job("https://b.com/two")).await.unwrap();

    let jobs = db.list_jobs(&JobFilter::default()).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, two.id);
    assert_eq!(jobs[1].id, one.id);

    db.set_flags(&one.id, FlagsUpdate { watched: Some(true), starred: None })
        .await
        .unwrap();
    let watched = db
        .list_jobs(&JobFilter {
            watched: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(watched.len(), 1);
    assert_eq!(watched[0].id, one.id);

    let pending = db.list_by_status(&[JobStatus::Pending]).await.unwrap();
    assert_eq!(pending[0].id, one.id);
    assert!(db.list_by_status(&[]).await.unwrap().is_empty());

    assert_eq!(
        db.find_by_url("https://b.com/two").await.unwrap().unwrap().id,
        two.id
    );
    assert!(db.find_by_url("https://c.com").await.unwrap().is_none());
}

#[tokio::test]
async fn starring_implies_watched() {
    let db = open_memory().await.unwrap();
    let job = db.create_job(&new_job("https://a.com/1")).await.unwrap();

    let j = db
        .set_flags(&job.id, FlagsUpdate { watched: None, starred: Some(true) })
        .await
        .unwrap()
        .unwrap();
    assert!(j.starred && j.watched);

    let j = db
        .set_flags(&job.id, FlagsUpdate { watched: None, starred: Some(false) })
        .await
        .unwrap()
        .unwrap();
    assert!(!j.starred);
    assert!(j.watched, "unstarring keeps watched");

    let j = db
        .set_flags(&job.id, FlagsUpdate { watched: Some(false), starred: Some(false) })
        .await
        .unwrap()
        .unwrap();
    assert!(!j.watched);
    assert!(db
        .set_flags("missing", FlagsUpdate::default())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn replace_manifest_entry_moves_converted_entry_last() {
    let db = open_memory().await.unwrap();
    let job = db.create_job(&new_job("https://a.com/1")).await.unwrap();
    db.claim_pending(&job.id).await.unwrap();
    db.mark_completed(&job.id, &outcome("A_Title")).await.unwrap();

    assert!(db
        .replace_manifest_entry(&job.id, "A_Title/clip.webm", "A_Title/clip.mp4")
        .await
        .unwrap());
    let job = db.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(
        job.file_manifest,
        vec!["A_Title/metadata.json".to_string(), "A_Title/clip.mp4".to_string()]
    );
    assert!(!db
        .replace_manifest_entry("missing", "a", "b")
        .await
        .unwrap());
}

#[tokio::test]
async fn delete_only_finished_jobs() {
    let db = open_memory().await.unwrap();
    let job = db.create_job(&new_job("https://a.com/1")).await.unwrap();

    assert_eq!(
        db.delete_finished_job(&job.id).await.unwrap(),
        DeleteOutcome::Active(JobStatus::Pending)
    );
    db.claim_pending(&job.id).await.unwrap();
    db.mark_failed(&job.id, "boom").await.unwrap();

    match db.delete_finished_job(&job.id).await.unwrap() {
        DeleteOutcome::Deleted(j) => assert_eq!(j.id, job.id),
        other => panic!("expected Deleted, got {other:?}"),
    }
    assert_eq!(
        db.delete_finished_job(&job.id).await.unwrap(),
        DeleteOutcome::NotFound
    );
}

#[tokio::test]
async fn message_id_is_stored() {
    let db = open_memory().await.unwrap();
    let job = db.create_job(&new_job("https://a.com/1")).await.unwrap();
    db.set_message_id(&job.id, 777).await.unwrap();
    assert_eq!(
        db.get_job(&job.id).await.unwrap().unwrap().notification_message_id,
        Some(777)
    );
}
