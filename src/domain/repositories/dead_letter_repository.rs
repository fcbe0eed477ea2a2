// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::dead_letter::DeadLetterJob;
use crate::domain::models::job::Job;
use crate::domain::repositories::job_repository::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;

/// 死信仓库特质
#[async_trait]
pub trait DeadLetterRepository: Send + Sync {
    /// 在同一事务中写入死信记录并删除原作业
    ///
    /// 原作业已不存在时返回 `RepositoryError::NotFound` 且不写入死信
    async fn archive(&self, job: &Job, last_error: &str) -> Result<DeadLetterJob, RepositoryError>;

    /// 在同一事务中以原类型和负载重新入队并删除死信记录
    ///
    /// 新作业尝试次数清零，最大尝试次数为 `max_attempts`
    async fn restore(&self, id: i64, max_attempts: i32) -> Result<Job, RepositoryError>;

    /// 根据ID查找死信
    async fn find_by_id(&self, id: i64) -> Result<Option<DeadLetterJob>, RepositoryError>;

    /// 按归档时间倒序列出死信
    async fn list(&self, limit: u64) -> Result<Vec<DeadLetterJob>, RepositoryError>;

    /// 删除死信，返回是否存在
    async fn delete(&self, id: i64) -> Result<bool, RepositoryError>;

    /// 删除归档时间早于 `cutoff` 的死信
    async fn purge_archived_before(
        &self,
        cutoff: DateTime<FixedOffset>,
    ) -> Result<u64, RepositoryError>;

    /// 死信总数
    async fn count(&self) -> Result<u64, RepositoryError>;

    /// 按作业类型统计死信数量
    async fn count_by_type(&self) -> Result<HashMap<String, u64>, RepositoryError>;
}
