// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{set_archived_at, set_job_created_at, setup_db};
use chrono::{Duration, Utc};
use jobrs::domain::models::job::{JobStatus, NewJob};
use jobrs::domain::repositories::job_repository::{JobRepository, RepositoryError};
use jobrs::infrastructure::repositories::dead_letter_repo_impl::DeadLetterRepositoryImpl;
use jobrs::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use jobrs::queue::dead_letter::{DeadLetterConfig, DeadLetterQueue};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

fn build(db: &Arc<DatabaseConnection>) -> (JobRepositoryImpl, DeadLetterQueue) {
    let repo = JobRepositoryImpl::new(db.clone());
    let dlq = DeadLetterQueue::new(
        Arc::new(DeadLetterRepositoryImpl::new(db.clone())),
        DeadLetterConfig {
            max_attempts: 4,
            ..DeadLetterConfig::default()
        },
    );
    (repo, dlq)
}

#[tokio::test]
async fn test_move_job_archives_and_removes_live_row() {
    let db = setup_db().await;
    let (repo, dlq) = build(&db);
    let payload = vec![1u8, 2, 3, 250];
    let job = repo
        .enqueue(
            NewJob::new("send_email", payload.clone())
                .with_tenant("7")
                .with_max_attempts(1),
        )
        .await
        .unwrap();
    let claimed = repo.claim_next().await.unwrap().unwrap();
    assert!(dlq.should_move(&claimed));

    let archived = dlq.move_job(&claimed, "mailbox full").await.unwrap();

    assert_eq!(archived.original_job_id, job.id);
    assert_eq!(archived.job_type, "send_email");
    assert_eq!(archived.tenant_id.as_deref(), Some("7"));
    assert_eq!(archived.payload, payload);
    assert_eq!(archived.attempt_count, 1);
    assert_eq!(archived.last_error.as_deref(), Some("mailbox full"));

    assert!(repo.find_by_id(job.id).await.unwrap().is_none());
    assert_eq!(dlq.stats().await.unwrap().total, 1);
}

#[tokio::test]
async fn test_move_missing_job_leaves_no_archive() {
    let db = setup_db().await;
    let (repo, dlq) = build(&db);
    let job = repo.enqueue(NewJob::new("a", "{}")).await.unwrap();
    let claimed = repo.claim_next().await.unwrap().unwrap();

    dlq.move_job(&claimed, "first").await.unwrap();
    // The live row is gone, a second move must not duplicate the archive
    let again = dlq.move_job(&claimed, "second").await;

    assert!(matches!(again, Err(RepositoryError::NotFound)));
    assert_eq!(dlq.stats().await.unwrap().total, 1);
    assert!(repo.find_by_id(job.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_should_move_when_exhausted_or_stale() {
    let db = setup_db().await;
    let (repo, dlq) = build(&db);

    let job = repo
        .enqueue(NewJob::new("a", "{}").with_max_attempts(3))
        .await
        .unwrap();
    let claimed = repo.claim_next().await.unwrap().unwrap();
    assert!(!dlq.should_move(&claimed));

    set_job_created_at(&db, job.id, (Utc::now() - Duration::hours(25)).into()).await;
    let aged = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert!(dlq.should_move(&aged));
}

#[tokio::test]
async fn test_reprocess_restores_job_with_fresh_attempts() {
    let db = setup_db().await;
    let (repo, dlq) = build(&db);
    let payload = br#"{"to":"a@example.com"}"#.to_vec();
    repo.enqueue(
        NewJob::new("send_email", payload.clone())
            .with_tenant("99")
            .with_max_attempts(1),
    )
    .await
    .unwrap();
    let claimed = repo.claim_next().await.unwrap().unwrap();
    let archived = dlq.move_job(&claimed, "boom").await.unwrap();

    let restored = dlq.reprocess(archived.id).await.unwrap();

    assert_ne!(restored.id, claimed.id);
    assert_eq!(restored.job_type, "send_email");
    assert_eq!(restored.tenant_id.as_deref(), Some("99"));
    assert_eq!(restored.payload, payload);
    assert_eq!(restored.status, JobStatus::Pending);
    assert_eq!(restored.attempt_count, 0);
    assert_eq!(restored.max_attempts, 4);
    assert!(dlq.find_by_id(archived.id).await.unwrap().is_none());

    let next = repo.claim_next().await.unwrap().unwrap();
    assert_eq!(next.id, restored.id);
}

#[tokio::test]
async fn test_reprocess_unknown_entry() {
    let db = setup_db().await;
    let (_repo, dlq) = build(&db);

    let result = dlq.reprocess(31337).await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
}

#[tokio::test]
async fn test_cleanup_respects_retention() {
    let db = setup_db().await;
    let (repo, dlq) = build(&db);

    let mut archived = Vec::new();
    for _ in 0..3 {
        repo.enqueue(NewJob::new("a", "{}")).await.unwrap();
        let claimed = repo.claim_next().await.unwrap().unwrap();
        archived.push(dlq.move_job(&claimed, "boom").await.unwrap());
    }
    set_archived_at(&db, archived[0].id, (Utc::now() - Duration::days(30)).into()).await;
    set_archived_at(&db, archived[1].id, (Utc::now() - Duration::days(13)).into()).await;

    let deleted = dlq.cleanup(Duration::days(14)).await.unwrap();

    assert_eq!(deleted, 1);
    assert!(dlq.find_by_id(archived[0].id).await.unwrap().is_none());
    assert!(dlq.find_by_id(archived[1].id).await.unwrap().is_some());
    assert!(dlq.find_by_id(archived[2].id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_stats_list_and_delete() {
    let db = setup_db().await;
    let (repo, dlq) = build(&db);

    for job_type in ["send_email", "send_email", "process_ai"] {
        repo.enqueue(NewJob::new(job_type, "{}")).await.unwrap();
        let claimed = repo.claim_next().await.unwrap().unwrap();
        dlq.move_job(&claimed, "boom").await.unwrap();
    }

    let stats = dlq.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_type.get("send_email"), Some(&2));
    assert_eq!(stats.by_type.get("process_ai"), Some(&1));

    let listed = dlq.list(2).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].id > listed[1].id);

    assert!(dlq.delete(listed[0].id).await.unwrap());
    assert!(!dlq.delete(listed[0].id).await.unwrap());
    assert_eq!(dlq.stats().await.unwrap().total, 2);
}
