// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::{Job, NewJob};
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::debug;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 同一幂等键的作业已经入队
    #[error("Job already scheduled for idempotency key {0}")]
    AlreadyScheduled(String),

    /// 负载序列化失败
    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 入队选项
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// 租户标识
    pub tenant_id: Option<String>,
    /// 最早执行时间，默认立即执行
    pub run_at: Option<DateTime<FixedOffset>>,
    /// 幂等键
    pub idempotency_key: Option<String>,
    /// 最大尝试次数，默认使用配置值
    pub max_attempts: Option<i32>,
}

/// 作业队列特质
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// 入队作业
    async fn enqueue(
        &self,
        job_type: &str,
        payload: Vec<u8>,
        options: EnqueueOptions,
    ) -> Result<Job, QueueError>;

    /// 取消尚未开始的作业
    async fn cancel(&self, job_id: i64) -> Result<bool, QueueError>;

    /// 将负载序列化为 JSON 后入队
    async fn enqueue_json<T>(
        &self,
        job_type: &str,
        payload: &T,
        options: EnqueueOptions,
    ) -> Result<Job, QueueError>
    where
        T: Serialize + Sync + ?Sized,
        Self: Sized,
    {
        let bytes = serde_json::to_vec(payload)?;
        self.enqueue(job_type, bytes, options).await
    }
}

/// 作业生产者
///
/// 写入作业后唤醒处理器，不必等到下一次轮询
pub struct JobProducer<R: JobRepository + ?Sized> {
    /// 作业仓库
    repository: Arc<R>,
    /// 处理器的唤醒信号
    notify: Arc<Notify>,
}

impl<R: JobRepository + ?Sized> JobProducer<R> {
    /// 创建新的作业生产者
    ///
    /// # 参数
    ///
    /// * `repository` - 作业仓库
    /// * `notify` - 处理器的唤醒信号
    pub fn new(repository: Arc<R>, notify: Arc<Notify>) -> Self {
        Self { repository, notify }
    }
}

impl<R: JobRepository + ?Sized> Clone for JobProducer<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            notify: self.notify.clone(),
        }
    }
}

#[async_trait]
impl<R: JobRepository + ?Sized> JobQueue for JobProducer<R> {
    /// 入队作业
    ///
    /// # 参数
    ///
    /// * `job_type` - 作业类型
    /// * `payload` - 负载数据
    /// * `options` - 入队选项
    ///
    /// # 返回值
    ///
    /// * `Ok(Job)` - 入队成功的作业
    /// * `Err(QueueError::AlreadyScheduled)` - 幂等键重复
    async fn enqueue(
        &self,
        job_type: &str,
        payload: Vec<u8>,
        options: EnqueueOptions,
    ) -> Result<Job, QueueError> {
        let job = NewJob {
            tenant_id: options.tenant_id,
            job_type: job_type.to_string(),
            payload,
            idempotency_key: options.idempotency_key,
            max_attempts: options.max_attempts,
            run_at: options.run_at,
        };

        match self.repository.enqueue(job).await {
            Ok(created) => {
                debug!(job_id = created.id, job_type, "Job enqueued");
                self.notify.notify_one();
                Ok(created)
            }
            Err(RepositoryError::Duplicate(key)) => {
                debug!(job_type, idempotency_key = %key, "Job already scheduled, skipping");
                Err(QueueError::AlreadyScheduled(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn cancel(&self, job_id: i64) -> Result<bool, QueueError> {
        Ok(self.repository.cancel(job_id).await?)
    }
}

#[async_trait]
impl<T: JobQueue + ?Sized> JobQueue for Arc<T> {
    async fn enqueue(
        &self,
        job_type: &str,
        payload: Vec<u8>,
        options: EnqueueOptions,
    ) -> Result<Job, QueueError> {
        (**self).enqueue(job_type, payload, options).await
    }

    async fn cancel(&self, job_id: i64) -> Result<bool, QueueError> {
        (**self).cancel(job_id).await
    }
}
