// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::Job;
use crate::domain::repositories::job_repository::JobRepository;
use crate::domain::services::broadcaster::{Broadcaster, JOB_COMPLETED_EVENT};
use crate::infrastructure::observability::metrics::{
    JOBS_PROCESSED_TOTAL, JOB_PROCESSING_SECONDS, JOB_RETRIES_TOTAL,
};
use crate::queue::backoff::{BackoffConfig, BackoffStrategy};
use crate::queue::dead_letter::DeadLetterQueue;
use crate::queue::job_queue::JobProducer;
use crate::queue::rate_limiter::JobRateLimiter;
use crate::utils::errors::{JobError, WorkerError};
use crate::utils::retry_policy::rate_limit_wait;
use crate::workers::handlers::{HandlerRegistry, JobContext};
use crate::workers::worker::Worker;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use futures::FutureExt;
use metrics::{counter, histogram};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 处理器配置
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// 没有唤醒信号时的轮询间隔
    pub poll_interval: Duration,
    /// 每次唤醒最多认领的作业数
    pub claim_batch_size: usize,
    pub backoff: BackoffConfig,
    pub backoff_strategy: BackoffStrategy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            claim_batch_size: 10,
            backoff: BackoffConfig::default(),
            backoff_strategy: BackoffStrategy::default(),
        }
    }
}

/// 作业处理器
///
/// 在定时器或唤醒信号到来时认领作业，每个作业在独立的 tokio 任务中执行，
/// 主循环从不等待处理器。取消后停止认领并等待进行中的作业结束。
#[derive(Clone)]
pub struct Processor {
    repository: Arc<dyn JobRepository>,
    registry: Arc<HandlerRegistry>,
    rate_limiter: Arc<JobRateLimiter>,
    dead_letter: Arc<DeadLetterQueue>,
    broadcaster: Arc<dyn Broadcaster>,
    notify: Arc<Notify>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    config: ProcessorConfig,
    worker_id: Uuid,
}

impl Processor {
    /// 创建新的处理器
    ///
    /// # 参数
    ///
    /// * `repository` - 作业仓库
    /// * `registry` - 处理器注册表
    /// * `rate_limiter` - 按类型的准入控制
    /// * `dead_letter` - 死信队列
    /// * `broadcaster` - 完成通知
    /// * `config` - 处理器配置
    pub fn new(
        repository: Arc<dyn JobRepository>,
        registry: Arc<HandlerRegistry>,
        rate_limiter: Arc<JobRateLimiter>,
        dead_letter: Arc<DeadLetterQueue>,
        broadcaster: Arc<dyn Broadcaster>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            repository,
            registry,
            rate_limiter,
            dead_letter,
            broadcaster,
            notify: Arc::new(Notify::new()),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            config,
            worker_id: Uuid::new_v4(),
        }
    }

    /// 使用外部的关闭令牌
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// 创建与本处理器共享唤醒信号的生产者
    pub fn producer(&self) -> JobProducer<dyn JobRepository> {
        JobProducer::new(self.repository.clone(), self.notify.clone())
    }

    /// 唤醒处理器，多次调用会合并为一次
    pub fn notify_new_job(&self) {
        self.notify.notify_one();
    }

    pub fn dead_letter_queue(&self) -> &Arc<DeadLetterQueue> {
        &self.dead_letter
    }

    pub fn rate_limiter(&self) -> &Arc<JobRateLimiter> {
        &self.rate_limiter
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 主循环，直到关闭令牌被取消，然后等待进行中的作业
    pub async fn start(&self) {
        info!(worker_id = %self.worker_id, "Job processor started");

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Job processor stopping, waiting for in-flight jobs");
                    break;
                }
                _ = self.notify.notified() => {
                    self.process_next().await;
                }
                _ = ticker.tick() => {
                    self.process_next().await;
                }
            }
        }

        self.wait().await;
        info!(worker_id = %self.worker_id, "Job processor stopped");
    }

    /// 等待当前所有进行中的作业结束
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// 认领并派发一批作业，返回认领数量
    pub async fn process_next(&self) -> usize {
        let mut claimed = 0;

        while claimed < self.config.claim_batch_size {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.repository.claim_next().await {
                Ok(Some(job)) => {
                    claimed += 1;
                    let this = self.clone();
                    self.tracker.spawn(async move {
                        this.process_job(job).await;
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Failed to claim next job");
                    break;
                }
            }
        }

        if claimed > 0 {
            debug!(claimed, "Dispatched claimed jobs");
        }
        claimed
    }

    #[instrument(skip(self, job), fields(job_id = job.id, job_type = %job.job_type, attempt = job.attempt_count))]
    async fn process_job(&self, job: Job) {
        match self.repository.is_processed(job.id).await {
            Ok(true) => {
                info!("Job already processed, marking completed");
                if let Err(e) = self.repository.mark_completed(job.id).await {
                    error!(error = %e, "Failed to mark processed job completed");
                }
                return;
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Idempotency check failed, processing anyway"),
        }

        let permit = match self.rate_limiter.acquire(&job.job_type, &self.shutdown).await {
            Ok(permit) => permit,
            Err(e) => {
                // Left in processing; the reaper returns it to pending
                warn!(error = %e, "Admission aborted, job left for the reaper");
                return;
            }
        };

        let started = Instant::now();
        let ctx = JobContext::from(&job);
        let outcome = AssertUnwindSafe(self.registry.dispatch(&ctx, &job.payload))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(JobError::Other(anyhow::anyhow!("job handler panicked"))));
        let elapsed = started.elapsed();

        match outcome {
            Ok(()) => self.handle_success(&job, elapsed).await,
            Err(err) => self.handle_failure(&job, err, elapsed).await,
        }

        drop(permit);
    }

    async fn handle_success(&self, job: &Job, elapsed: Duration) {
        record_outcome(job, "success", elapsed);

        if let Err(e) = self.repository.complete_processed(job.id).await {
            error!(error = %e, "Failed to record job completion");
            return;
        }

        info!(duration_ms = elapsed.as_millis() as u64, "Job completed");

        match job.tenant_user_id() {
            Some(user_id) => {
                self.broadcaster
                    .broadcast_to_user(user_id, JOB_COMPLETED_EVENT, &job.job_type)
            }
            None => self.broadcaster.broadcast(JOB_COMPLETED_EVENT, &job.job_type),
        }
    }

    async fn handle_failure(&self, job: &Job, err: JobError, elapsed: Duration) {
        record_outcome(job, "failed", elapsed);
        let message = err.message();

        if self.dead_letter.should_move(job) {
            if let Err(e) = self.dead_letter.move_job(job, &message).await {
                error!(error = %e, "Failed to move job to dead letter queue, marking failed");
                if let Err(e) = self.repository.mark_dead(job.id, &message).await {
                    error!(error = %e, "Failed to mark job failed");
                }
            }
            return;
        }

        let attempt = u32::try_from(job.attempt_count).unwrap_or(0);
        let mut delay = self
            .config
            .backoff_strategy
            .delay(attempt, &self.config.backoff);
        if let Some(wait) = rate_limit_wait(&message) {
            delay = delay.max(wait);
        }

        if err.is_retryable() {
            counter!(JOB_RETRIES_TOTAL, "type" => job.job_type.clone()).increment(1);
            warn!(error = %message, retry_in_ms = delay.as_millis() as u64, "Retryable job failure");
        } else {
            error!(
                error = %message,
                permanent = err.is_permanent(),
                retry_in_ms = delay.as_millis() as u64,
                "Job failed"
            );
        }

        if let Err(e) = self
            .repository
            .mark_failed(job.id, &message, retry_at(delay))
            .await
        {
            error!(error = %e, "Failed to reschedule job");
        }
    }
}

fn record_outcome(job: &Job, status: &'static str, elapsed: Duration) {
    histogram!(JOB_PROCESSING_SECONDS, "type" => job.job_type.clone(), "status" => status)
        .record(elapsed.as_secs_f64());
    counter!(JOBS_PROCESSED_TOTAL, "type" => job.job_type.clone(), "status" => status)
        .increment(1);
}

fn retry_at(delay: Duration) -> DateTime<FixedOffset> {
    let now = Utc::now();
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(now)
        .into()
}

#[async_trait]
impl Worker for Processor {
    async fn run(&self) -> Result<(), WorkerError> {
        self.start().await;
        Ok(())
    }

    fn name(&self) -> &str {
        "job-processor"
    }
}
