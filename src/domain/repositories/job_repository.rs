// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::{Job, JobStatus, NewJob};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::DbErr;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 幂等键冲突
    #[error("Duplicate idempotency key: {0}")]
    Duplicate(String),
}

/// 作业仓库特质
///
/// 定义持久化队列的数据访问接口。所有状态转换都是单条原子语句
/// 或单个事务，多个工作者并发调用时不会重复认领同一作业。
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 写入新作业，状态为 pending
    ///
    /// 幂等键已存在时返回 `RepositoryError::Duplicate`
    async fn enqueue(&self, job: NewJob) -> Result<Job, RepositoryError>;

    /// 根据ID查找作业
    async fn find_by_id(&self, id: i64) -> Result<Option<Job>, RepositoryError>;

    /// 原子认领下一个可执行作业
    ///
    /// 选取 `run_at <= now` 的最早 pending 作业（同时间按ID），
    /// 置为 processing、记录开始时间并将尝试次数加一
    async fn claim_next(&self) -> Result<Option<Job>, RepositoryError>;

    /// 标记作业完成
    async fn mark_completed(&self, id: i64) -> Result<(), RepositoryError>;

    /// 记录失败并重新排期
    ///
    /// 作业回到 pending，`run_at` 设为 `retry_at`，尝试次数不变
    async fn mark_failed(
        &self,
        id: i64,
        error: &str,
        retry_at: DateTime<FixedOffset>,
    ) -> Result<(), RepositoryError>;

    /// 标记作业为终态失败，不再重试
    async fn mark_dead(&self, id: i64, error: &str) -> Result<(), RepositoryError>;

    /// 写入幂等账本，重复写入不报错
    async fn record_processed(&self, id: i64) -> Result<(), RepositoryError>;

    /// 查询幂等账本
    async fn is_processed(&self, id: i64) -> Result<bool, RepositoryError>;

    /// 在同一事务中写入幂等账本并标记完成
    async fn complete_processed(&self, id: i64) -> Result<(), RepositoryError>;

    /// 回收僵尸作业
    ///
    /// 将超过 `older_than` 未更新的 processing 作业放回 pending，
    /// 返回回收数量
    async fn reclaim_stuck(&self, older_than: chrono::Duration) -> Result<u64, RepositoryError>;

    /// 取消尚未开始的作业，返回是否有作业被取消
    async fn cancel(&self, id: i64) -> Result<bool, RepositoryError>;

    /// 统计指定状态的作业数量
    async fn count_by_status(&self, status: JobStatus) -> Result<u64, RepositoryError>;
}
