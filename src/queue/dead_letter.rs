// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::dead_letter::{DeadLetterJob, DeadLetterStats};
use crate::domain::models::job::Job;
use crate::domain::repositories::dead_letter_repository::DeadLetterRepository;
use crate::domain::repositories::job_repository::RepositoryError;
use crate::infrastructure::observability::metrics::JOBS_DEAD_LETTER_TOTAL;
use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use tracing::{error, info};

/// 死信队列配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadLetterConfig {
    /// 新作业和重新处理作业的最大尝试次数
    pub max_attempts: i32,
    /// 作业存活超过该时长后失败即进入死信
    pub stale_after: chrono::Duration,
    /// 死信保留时长
    pub retention: chrono::Duration,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            stale_after: chrono::Duration::hours(24),
            retention: chrono::Duration::days(14),
        }
    }
}

/// 死信队列
///
/// 决定失败作业是否放弃重试，并负责归档、重新处理和保留期清理
pub struct DeadLetterQueue {
    repository: Arc<dyn DeadLetterRepository>,
    config: DeadLetterConfig,
}

impl DeadLetterQueue {
    /// 创建死信队列
    ///
    /// # 参数
    ///
    /// * `repository` - 死信仓库
    /// * `config` - 死信配置
    pub fn new(repository: Arc<dyn DeadLetterRepository>, config: DeadLetterConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &DeadLetterConfig {
        &self.config
    }

    /// 失败的作业是否应该进入死信
    ///
    /// 已用尽尝试次数，或自创建起已超过过期时长
    pub fn should_move(&self, job: &Job) -> bool {
        job.attempts_exhausted() || job.age() > self.config.stale_after
    }

    /// 将作业移入死信队列
    ///
    /// 写入死信和删除原作业在同一事务中完成
    pub async fn move_job(
        &self,
        job: &Job,
        last_error: &str,
    ) -> Result<DeadLetterJob, RepositoryError> {
        let archived = self.repository.archive(job, last_error).await?;

        counter!(JOBS_DEAD_LETTER_TOTAL, "type" => job.job_type.clone()).increment(1);
        error!(
            job_id = job.id,
            job_type = %job.job_type,
            attempts = job.attempt_count,
            dead_letter_id = archived.id,
            error = %last_error,
            "Job moved to dead letter queue"
        );

        Ok(archived)
    }

    /// 重新处理死信
    ///
    /// 以原类型、租户和负载创建新的 pending 作业，尝试次数清零
    pub async fn reprocess(&self, id: i64) -> Result<Job, RepositoryError> {
        let job = self.repository.restore(id, self.config.max_attempts).await?;

        info!(
            dead_letter_id = id,
            job_id = job.id,
            job_type = %job.job_type,
            "Dead letter job re-enqueued"
        );

        Ok(job)
    }

    /// 删除超过保留期的死信
    pub async fn cleanup(&self, retention: chrono::Duration) -> Result<u64, RepositoryError> {
        let cutoff = Utc::now() - retention;
        let deleted = self.repository.purge_archived_before(cutoff.into()).await?;

        if deleted > 0 {
            info!(deleted, "Purged expired dead letter jobs");
        }

        Ok(deleted)
    }

    /// 删除单条死信
    pub async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        self.repository.delete(id).await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<DeadLetterJob>, RepositoryError> {
        self.repository.find_by_id(id).await
    }

    /// 按归档时间倒序列出死信
    pub async fn list(&self, limit: u64) -> Result<Vec<DeadLetterJob>, RepositoryError> {
        self.repository.list(limit).await
    }

    /// 死信统计
    pub async fn stats(&self) -> Result<DeadLetterStats, RepositoryError> {
        Ok(DeadLetterStats {
            total: self.repository.count().await?,
            by_type: self.repository.count_by_type().await?,
        })
    }
}
