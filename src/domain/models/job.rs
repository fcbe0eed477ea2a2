// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 后台作业实体
///
/// 表示持久化队列中的一个工作单元。作业由生产者写入，
/// 由处理器认领执行，失败后按退避策略重新排期，
/// 超过最大尝试次数后移入死信队列。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// 作业唯一标识符（自增）
    pub id: i64,
    /// 租户标识，可为空；可解析为正整数时视为用户ID
    pub tenant_id: Option<String>,
    /// 作业类型标签，决定由哪个处理器执行
    pub job_type: String,
    /// 不透明的负载数据，原样存储和返回
    pub payload: Vec<u8>,
    /// 作业状态
    pub status: JobStatus,
    /// 幂等键，非空时全局唯一
    pub idempotency_key: Option<String>,
    /// 已认领次数
    pub attempt_count: i32,
    /// 最大尝试次数
    pub max_attempts: i32,
    /// 最近一次失败的错误信息
    pub last_error: Option<String>,
    /// 最早可执行时间
    pub run_at: DateTime<FixedOffset>,
    /// 最近一次被认领的时间
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 完成时间
    pub completed_at: Option<DateTime<FixedOffset>>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

impl Job {
    /// 从租户标识中解析用户ID
    ///
    /// 取租户标识开头的整数部分（如 `"12abc"` 得到 12），
    /// 仅当结果为正数时返回 `Some`
    pub fn tenant_user_id(&self) -> Option<i64> {
        self.tenant_id
            .as_deref()
            .and_then(leading_integer)
            .filter(|id| *id > 0)
    }

    /// 作业自创建以来经过的时间
    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.created_at)
    }

    /// 是否已用尽所有尝试次数
    pub fn attempts_exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }
}

/// 作业状态
///
/// 状态转换：
/// Pending → Processing → Completed
/// Processing → Pending（失败重试或僵尸回收）
/// Pending → Cancelled
/// Processing → Failed（应进入死信但归档失败）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 等待执行
    #[default]
    Pending,
    /// 已被某个工作者认领
    Processing,
    /// 执行成功
    Completed,
    /// 在执行前被取消
    Cancelled,
    /// 放弃重试但未能归档到死信
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "cancelled" => Ok(JobStatus::Cancelled),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 内置作业类型
///
/// 作业类型本身是开放的字符串标签，这里只列出系统自带处理器的类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    SendEmail,
    SendVerificationEmail,
    SendPasswordResetEmail,
    ProcessAi,
    ProcessWebhook,
}

impl JobType {
    /// 所有内置类型
    pub const ALL: [JobType; 5] = [
        JobType::SendEmail,
        JobType::SendVerificationEmail,
        JobType::SendPasswordResetEmail,
        JobType::ProcessAi,
        JobType::ProcessWebhook,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            JobType::SendEmail => "send_email",
            JobType::SendVerificationEmail => "send_verification_email",
            JobType::SendPasswordResetEmail => "send_password_reset_email",
            JobType::ProcessAi => "process_ai",
            JobType::ProcessWebhook => "process_webhook",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

/// 待入队的新作业
///
/// 未设置的字段由仓库填充默认值：`run_at` 默认为当前时间，
/// `max_attempts` 默认为配置的最大尝试次数。
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub tenant_id: Option<String>,
    pub job_type: String,
    pub payload: Vec<u8>,
    pub idempotency_key: Option<String>,
    pub max_attempts: Option<i32>,
    pub run_at: Option<DateTime<FixedOffset>>,
}

impl NewJob {
    /// 创建新作业
    ///
    /// # 参数
    ///
    /// * `job_type` - 作业类型
    /// * `payload` - 负载数据
    pub fn new(job_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            job_type: job_type.into(),
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// 延迟到指定时间执行
    pub fn run_at(mut self, run_at: DateTime<FixedOffset>) -> Self {
        self.run_at = Some(run_at);
        self
    }
}

/// 解析字符串开头的带符号整数，忽略前导空白和其后的内容
fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits = s[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len() - sign_len);
    if digits == 0 {
        return None;
    }
    s[..sign_len + digits].parse().ok()
}
