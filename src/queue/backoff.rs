// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Deserialize;
use std::time::Duration;

/// 退避配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// 基础延迟
    pub base_delay: Duration,
    /// 指数部分的上限
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// 退避策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// 纯指数退避
    Exponential,
    /// 指数值的一半加上 [0, 指数值) 的随机抖动
    #[default]
    FullJitter,
}

impl BackoffStrategy {
    /// 计算第 `attempt` 次尝试后的等待时间
    pub fn delay(&self, attempt: u32, config: &BackoffConfig) -> Duration {
        match self {
            BackoffStrategy::Exponential => exponential(attempt, config),
            BackoffStrategy::FullJitter => full_jitter(attempt, config),
        }
    }
}

/// 指数退避：`min(base * 2^attempt, max)`
///
/// 第 0 次返回 `base_delay`，溢出时饱和到 `max_delay`
pub fn exponential(attempt: u32, config: &BackoffConfig) -> Duration {
    if attempt == 0 {
        return config.base_delay;
    }

    1u32.checked_shl(attempt)
        .and_then(|factor| config.base_delay.checked_mul(factor))
        .map_or(config.max_delay, |delay| delay.min(config.max_delay))
}

/// 全抖动退避：`exp / 2 + random[0, exp)`
///
/// 结果落在 `[exp/2, 1.5 * exp)`，第 0 次返回 `base_delay`
pub fn full_jitter(attempt: u32, config: &BackoffConfig) -> Duration {
    if attempt == 0 {
        return config.base_delay;
    }

    let exp = exponential(attempt, config);
    let exp_nanos = u64::try_from(exp.as_nanos()).unwrap_or(u64::MAX);
    if exp_nanos == 0 {
        return exp;
    }

    exp / 2 + Duration::from_nanos(rand::random_range(0..exp_nanos))
}
