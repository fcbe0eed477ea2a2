// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{set_job_updated_at, setup_db, setup_file_db};
use chrono::{Duration, FixedOffset, Utc};
use jobrs::domain::models::job::{JobStatus, NewJob};
use jobrs::domain::repositories::job_repository::{JobRepository, RepositoryError};
use jobrs::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn test_enqueue_applies_defaults_and_keeps_payload_bytes() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db).with_default_max_attempts(7);

    let payload = vec![0u8, 159, 146, 150, 255];
    let job = repo
        .enqueue(NewJob::new("resize_image", payload.clone()).with_tenant("42"))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempt_count, 0);
    assert_eq!(job.max_attempts, 7);
    assert_eq!(job.tenant_id.as_deref(), Some("42"));
    assert!(job.started_at.is_none());

    let found = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(found.payload, payload);
    assert_eq!(found.job_type, "resize_image");
}

#[tokio::test]
async fn test_enqueue_duplicate_idempotency_key_is_rejected() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db);

    repo.enqueue(NewJob::new("send_email", "{}").with_idempotency_key("welcome-1"))
        .await
        .unwrap();
    let second = repo
        .enqueue(NewJob::new("send_email", "{}").with_idempotency_key("welcome-1"))
        .await;

    match second {
        Err(RepositoryError::Duplicate(key)) => assert_eq!(key, "welcome-1"),
        other => panic!("expected duplicate error, got {:?}", other.map(|j| j.id)),
    }
    assert_eq!(repo.count_by_status(JobStatus::Pending).await.unwrap(), 1);

    // Jobs without a key never collide
    repo.enqueue(NewJob::new("send_email", "{}")).await.unwrap();
    repo.enqueue(NewJob::new("send_email", "{}")).await.unwrap();
    assert_eq!(repo.count_by_status(JobStatus::Pending).await.unwrap(), 3);
}

#[tokio::test]
async fn test_claim_next_orders_by_run_at_then_id() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db);
    let now = Utc::now();

    let later = repo
        .enqueue(NewJob::new("a", "{}").run_at((now - Duration::seconds(10)).into()))
        .await
        .unwrap();
    let earliest = repo
        .enqueue(NewJob::new("b", "{}").run_at((now - Duration::seconds(60)).into()))
        .await
        .unwrap();
    let tie = repo
        .enqueue(NewJob::new("c", "{}").run_at((now - Duration::seconds(10)).into()))
        .await
        .unwrap();
    repo.enqueue(NewJob::new("future", "{}").run_at((now + Duration::hours(1)).into()))
        .await
        .unwrap();

    let order: Vec<i64> = [
        repo.claim_next().await.unwrap().unwrap().id,
        repo.claim_next().await.unwrap().unwrap().id,
        repo.claim_next().await.unwrap().unwrap().id,
    ]
    .to_vec();

    assert_eq!(order, vec![earliest.id, later.id, tie.id]);
    assert!(repo.claim_next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_run_at_with_non_utc_offset_is_compared_as_instant() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db);
    let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
    let new_york = FixedOffset::west_opt(5 * 3600).unwrap();
    let now = Utc::now();

    let future = repo
        .enqueue(
            NewJob::new("later", "{}")
                .run_at((now + Duration::hours(1)).with_timezone(&new_york)),
        )
        .await
        .unwrap();
    let due = repo
        .enqueue(
            NewJob::new("due", "{}").run_at((now - Duration::minutes(1)).with_timezone(&tokyo)),
        )
        .await
        .unwrap();
    let overdue = repo
        .enqueue(
            NewJob::new("overdue", "{}")
                .run_at((now - Duration::minutes(5)).with_timezone(&new_york)),
        )
        .await
        .unwrap();

    assert_eq!(future.run_at.timestamp(), (now + Duration::hours(1)).timestamp());

    assert_eq!(repo.claim_next().await.unwrap().unwrap().id, overdue.id);
    assert_eq!(repo.claim_next().await.unwrap().unwrap().id, due.id);
    assert!(repo.claim_next().await.unwrap().is_none());

    let waiting = repo.find_by_id(future.id).await.unwrap().unwrap();
    assert_eq!(waiting.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_mark_failed_with_non_utc_retry_at_is_not_due_early() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db);
    let job = repo.enqueue(NewJob::new("a", "{}")).await.unwrap();
    repo.claim_next().await.unwrap();

    let new_york = FixedOffset::west_opt(5 * 3600).unwrap();
    let retry_at = (Utc::now() + Duration::minutes(30)).with_timezone(&new_york);
    repo.mark_failed(job.id, "later", retry_at).await.unwrap();

    assert!(repo.claim_next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_claim_next_marks_processing_and_counts_attempt() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db);
    let job = repo.enqueue(NewJob::new("send_email", "{}")).await.unwrap();

    let claimed = repo.claim_next().await.unwrap().unwrap();
    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.status, JobStatus::Processing);
    assert_eq!(claimed.attempt_count, 1);
    assert!(claimed.started_at.is_some());

    // A processing job is never handed out twice
    assert!(repo.claim_next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_claim_next_on_empty_queue() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db);

    assert!(repo.claim_next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_mark_failed_reschedules_without_touching_attempts() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db);
    let job = repo.enqueue(NewJob::new("send_email", "{}")).await.unwrap();
    let claimed = repo.claim_next().await.unwrap().unwrap();

    let retry_at = Utc::now() + Duration::minutes(5);
    repo.mark_failed(claimed.id, "smtp timeout", retry_at.into())
        .await
        .unwrap();

    let found = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(found.status, JobStatus::Pending);
    assert_eq!(found.attempt_count, 1);
    assert_eq!(found.last_error.as_deref(), Some("smtp timeout"));
    assert_eq!(found.run_at.timestamp(), retry_at.timestamp());

    // Not due yet
    assert!(repo.claim_next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_mark_failed_unknown_job() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db);

    let result = repo.mark_failed(999, "boom", Utc::now().into()).await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
}

#[tokio::test]
async fn test_processed_ledger_and_completion() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db);
    let first = repo.enqueue(NewJob::new("send_email", "{}")).await.unwrap();
    let second = repo.enqueue(NewJob::new("send_email", "{}")).await.unwrap();

    assert!(!repo.is_processed(first.id).await.unwrap());
    repo.record_processed(first.id).await.unwrap();
    // Recording twice is harmless
    repo.record_processed(first.id).await.unwrap();
    assert!(repo.is_processed(first.id).await.unwrap());

    repo.claim_next().await.unwrap();
    repo.claim_next().await.unwrap();
    repo.complete_processed(second.id).await.unwrap();

    let done = repo.find_by_id(second.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.completed_at.is_some());
    assert!(repo.is_processed(second.id).await.unwrap());
    assert_eq!(repo.count_by_status(JobStatus::Completed).await.unwrap(), 1);
    assert_eq!(repo.count_by_status(JobStatus::Processing).await.unwrap(), 1);
}

#[tokio::test]
async fn test_complete_processed_missing_job_rolls_back_ledger() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db);

    let result = repo.complete_processed(4242).await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
    assert!(!repo.is_processed(4242).await.unwrap());
}

#[tokio::test]
async fn test_reclaim_stuck_only_touches_stale_processing_jobs() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db.clone());

    let stale = repo.enqueue(NewJob::new("a", "{}")).await.unwrap();
    let fresh = repo.enqueue(NewJob::new("b", "{}")).await.unwrap();
    let waiting = repo.enqueue(NewJob::new("c", "{}")).await.unwrap();
    repo.claim_next().await.unwrap();
    repo.claim_next().await.unwrap();

    set_job_updated_at(&db, stale.id, (Utc::now() - Duration::minutes(30)).into()).await;
    set_job_updated_at(&db, waiting.id, (Utc::now() - Duration::minutes(30)).into()).await;

    let rescued = repo.reclaim_stuck(Duration::minutes(5)).await.unwrap();
    assert_eq!(rescued, 1);

    let stale = repo.find_by_id(stale.id).await.unwrap().unwrap();
    assert_eq!(stale.status, JobStatus::Pending);
    assert_eq!(stale.attempt_count, 2);

    let fresh = repo.find_by_id(fresh.id).await.unwrap().unwrap();
    assert_eq!(fresh.status, JobStatus::Processing);
    assert_eq!(fresh.attempt_count, 1);

    let waiting = repo.find_by_id(waiting.id).await.unwrap().unwrap();
    assert_eq!(waiting.status, JobStatus::Pending);
    assert_eq!(waiting.attempt_count, 0);

    // The rescued job is claimable again
    let reclaimed = repo.claim_next().await.unwrap().unwrap();
    assert_eq!(reclaimed.id, stale.id);
    assert_eq!(reclaimed.attempt_count, 3);
}

#[tokio::test]
async fn test_cancel_only_applies_to_pending_jobs() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db);
    let running = repo.enqueue(NewJob::new("a", "{}")).await.unwrap();
    let queued = repo.enqueue(NewJob::new("b", "{}")).await.unwrap();
    repo.claim_next().await.unwrap();

    assert!(!repo.cancel(running.id).await.unwrap());
    assert!(repo.cancel(queued.id).await.unwrap());
    assert!(!repo.cancel(queued.id).await.unwrap());
    assert!(!repo.cancel(12345).await.unwrap());

    let cancelled = repo.find_by_id(queued.id).await.unwrap().unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(repo.claim_next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_claimers_never_share_a_job() {
    let dir = tempfile::tempdir().unwrap();
    let db = setup_file_db(dir.path(), 4).await;
    let repo = Arc::new(JobRepositoryImpl::new(db));

    let total = 40;
    for i in 0..total {
        repo.enqueue(NewJob::new("work", format!("{}", i)))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(job) = repo.claim_next().await.unwrap() {
                claimed.push(job.id);
            }
            claimed
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }

    let unique: HashSet<i64> = all.iter().copied().collect();
    assert_eq!(all.len(), total);
    assert_eq!(unique.len(), total);
    assert_eq!(
        repo.count_by_status(JobStatus::Processing).await.unwrap(),
        total as u64
    );
}

#[tokio::test]
async fn test_mark_dead_is_terminal() {
    let db = setup_db().await;
    let repo = JobRepositoryImpl::new(db);
    let job = repo.enqueue(NewJob::new("a", "{}")).await.unwrap();
    repo.claim_next().await.unwrap();

    repo.mark_dead(job.id, "archive unavailable").await.unwrap();

    let dead = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(dead.status, JobStatus::Failed);
    assert_eq!(dead.last_error.as_deref(), Some("archive unavailable"));
    assert!(dead.completed_at.is_some());
    assert!(repo.claim_next().await.unwrap().is_none());
    assert!(!repo.cancel(job.id).await.unwrap());
    assert!(matches!(
        repo.mark_dead(777, "x").await,
        Err(RepositoryError::NotFound)
    ));
}
