// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{set_job_updated_at, setup_db};
use chrono::Utc;
use jobrs::domain::models::job::{JobStatus, NewJob};
use jobrs::domain::repositories::job_repository::JobRepository;
use jobrs::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use jobrs::workers::reaper::ZombieReaper;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_rescue_zombies_returns_stuck_jobs_to_pending() {
    let db = setup_db().await;
    let repo = Arc::new(JobRepositoryImpl::new(db.clone()));
    let job = repo.enqueue(NewJob::new("process_ai", "{}")).await.unwrap();
    repo.claim_next().await.unwrap();
    set_job_updated_at(&db, job.id, (Utc::now() - chrono::Duration::minutes(10)).into()).await;

    let reaper = ZombieReaper::new(repo.clone(), Duration::from_secs(300));

    assert_eq!(reaper.rescue_zombies().await.unwrap(), 1);
    assert_eq!(reaper.rescue_zombies().await.unwrap(), 0);

    let rescued = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(rescued.status, JobStatus::Pending);
    assert_eq!(rescued.attempt_count, 2);
}

#[tokio::test]
async fn test_periodic_reaper_stops_on_shutdown() {
    let db = setup_db().await;
    let repo = Arc::new(JobRepositoryImpl::new(db.clone()));
    let job = repo.enqueue(NewJob::new("process_ai", "{}")).await.unwrap();
    repo.claim_next().await.unwrap();
    set_job_updated_at(&db, job.id, (Utc::now() - chrono::Duration::minutes(10)).into()).await;

    let shutdown = CancellationToken::new();
    let handle = ZombieReaper::new(repo.clone(), Duration::from_secs(60))
        .with_schedule(Duration::from_millis(20), shutdown.clone())
        .start();

    let mut rescued = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let current = repo.find_by_id(job.id).await.unwrap().unwrap();
        if current.status == JobStatus::Pending {
            rescued = true;
            break;
        }
    }
    assert!(rescued, "periodic pass should rescue the stuck job");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("reaper should stop after cancellation")
        .unwrap();
}
