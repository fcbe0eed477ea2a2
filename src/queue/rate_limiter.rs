// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::job::JobType;
use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 限流错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RateLimitError {
    /// 等待期间被取消
    #[error("rate limit wait cancelled")]
    Cancelled,
    /// 信号量已关闭
    #[error("rate limiter closed")]
    Closed,
}

/// 单个作业类型的限流配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobRateConfig {
    /// 同时执行的最大作业数
    pub concurrency: usize,
    /// 每秒补充的令牌数
    pub rate: f64,
    /// 令牌桶容量
    pub burst: u32,
}

impl JobRateConfig {
    pub const fn new(concurrency: usize, rate: f64, burst: u32) -> Self {
        Self {
            concurrency,
            rate,
            burst,
        }
    }
}

/// 未配置类型使用的限流配置
pub const FALLBACK_PROFILE: JobRateConfig = JobRateConfig::new(5, 1.0, 5);

/// 内置作业类型的默认限流配置
pub fn default_profiles() -> HashMap<String, JobRateConfig> {
    let email = JobRateConfig::new(5, 2.0, 5);
    HashMap::from([
        (JobType::SendEmail.to_string(), email),
        (JobType::SendVerificationEmail.to_string(), email),
        (JobType::SendPasswordResetEmail.to_string(), email),
        (JobType::ProcessAi.to_string(), JobRateConfig::new(3, 1.0, 3)),
        (
            JobType::ProcessWebhook.to_string(),
            JobRateConfig::new(10, 5.0, 10),
        ),
    ])
}

/// 单个类型的限流器状态
struct TypeLimiter {
    semaphore: Arc<Semaphore>,
    bucket: DefaultDirectRateLimiter,
    config: JobRateConfig,
}

impl TypeLimiter {
    fn new(config: JobRateConfig) -> Self {
        let period = if config.rate > 0.0 {
            Duration::try_from_secs_f64(1.0 / config.rate).unwrap_or(Duration::from_secs(1))
        } else {
            Duration::from_secs(1)
        };
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst);

        Self {
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
            bucket: RateLimiter::direct(quota),
            config,
        }
    }
}

/// 准入许可
///
/// 持有期间占用该类型的一个并发槽位，丢弃时自动归还
#[derive(Debug)]
pub struct AdmissionPermit {
    job_type: String,
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    /// 显式归还槽位
    pub fn release(self) {}
}

/// 限流器统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimiterStats {
    pub concurrency: usize,
    pub in_use: usize,
    pub rate: f64,
}

/// 按作业类型的准入控制器
///
/// 每个类型一个令牌桶加一个并发信号量。先取令牌再取槽位，
/// 两段等待都可以被取消。
pub struct JobRateLimiter {
    limiters: DashMap<String, Arc<TypeLimiter>>,
    fallback: Arc<TypeLimiter>,
}

impl JobRateLimiter {
    /// 创建限流器
    ///
    /// # 参数
    ///
    /// * `profiles` - 作业类型到限流配置的映射
    /// * `fallback` - 未知类型共用的配置
    pub fn new(profiles: HashMap<String, JobRateConfig>, fallback: JobRateConfig) -> Self {
        let limiters = DashMap::new();
        for (job_type, config) in profiles {
            limiters.insert(job_type, Arc::new(TypeLimiter::new(config)));
        }

        Self {
            limiters,
            fallback: Arc::new(TypeLimiter::new(fallback)),
        }
    }

    /// 使用内置默认配置创建
    pub fn with_defaults() -> Self {
        Self::new(default_profiles(), FALLBACK_PROFILE)
    }

    /// 注册或替换某个类型的限流配置
    ///
    /// 已发出的许可仍归还到旧信号量
    pub fn register(&self, job_type: impl Into<String>, config: JobRateConfig) {
        self.limiters
            .insert(job_type.into(), Arc::new(TypeLimiter::new(config)));
    }

    fn limiter_for(&self, job_type: &str) -> Arc<TypeLimiter> {
        self.limiters
            .get(job_type)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// 获取准入许可
    ///
    /// 依次等待令牌和并发槽位。`cancel` 触发时立即返回
    /// `RateLimitError::Cancelled`，不会占用槽位
    pub async fn acquire(
        &self,
        job_type: &str,
        cancel: &CancellationToken,
    ) -> Result<AdmissionPermit, RateLimitError> {
        let limiter = self.limiter_for(job_type);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
            _ = limiter.bucket.until_ready() => {}
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RateLimitError::Cancelled),
            permit = limiter.semaphore.clone().acquire_owned() => {
                permit.map_err(|_| RateLimitError::Closed)?
            }
        };

        debug!(job_type, "Admission granted");
        Ok(AdmissionPermit {
            job_type: job_type.to_string(),
            _permit: permit,
        })
    }

    /// 各类型当前的占用情况
    pub fn stats(&self) -> HashMap<String, RateLimiterStats> {
        self.limiters
            .iter()
            .map(|entry| {
                let limiter = entry.value();
                let concurrency = limiter.config.concurrency.max(1);
                (
                    entry.key().clone(),
                    RateLimiterStats {
                        concurrency,
                        in_use: concurrency.saturating_sub(limiter.semaphore.available_permits()),
                        rate: limiter.config.rate,
                    },
                )
            })
            .collect()
    }
}

impl Default for JobRateLimiter {
    fn default() -> Self {
        Self::with_defaults()
    }
}
