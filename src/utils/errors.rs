// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::job_repository::RepositoryError;
use crate::utils::retry_policy::is_retryable_error;
use thiserror::Error;

/// 作业处理错误类型
///
/// 分类只影响日志、指标和退避时长，所有失败都计入尝试次数
#[derive(Error, Debug)]
pub enum JobError {
    /// 明确的临时性故障
    #[error("transient failure: {0}")]
    Transient(String),

    /// 没有注册对应处理器的作业类型
    #[error("unknown job type: {0}")]
    UnknownType(String),

    /// 负载无法解析或校验失败
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// 处理器拒绝执行
    #[error("rejected: {0}")]
    Rejected(String),

    /// 其他错误，按错误文本分类
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl JobError {
    /// 是否属于永久性错误
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            JobError::UnknownType(_) | JobError::InvalidPayload(_) | JobError::Rejected(_)
        )
    }

    /// 是否属于可重试的临时性错误
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::Transient(_) => true,
            JobError::Other(e) => is_retryable_error(&format!("{:#}", e)),
            _ => false,
        }
    }

    /// 记录到作业上的错误文本，包含完整的错误链
    pub fn message(&self) -> String {
        match self {
            JobError::Other(e) => format!("{:#}", e),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        JobError::InvalidPayload(err.to_string())
    }
}

impl From<validator::ValidationErrors> for JobError {
    fn from(err: validator::ValidationErrors) -> Self {
        JobError::InvalidPayload(err.to_string())
    }
}

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("仓库错误: {0}")]
    RepositoryError(#[from] RepositoryError),

    #[error("内部错误: {0}")]
    InternalError(String),
}
