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

use crate::queue::backoff::{BackoffConfig, BackoffStrategy};
use crate::queue::dead_letter::DeadLetterConfig;
use crate::queue::rate_limiter::{default_profiles, JobRateConfig, FALLBACK_PROFILE};
use crate::workers::processor::ProcessorConfig;
use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含数据库、工作者、退避、死信、限流、指标、邮件和LLM等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 工作者配置
    pub worker: WorkerSettings,
    /// 退避策略配置
    pub backoff: BackoffSettings,
    /// 死信队列配置
    pub dead_letter: DeadLetterSettings,
    /// 按作业类型的限流配置
    #[serde(default)]
    pub rate_limits: RateLimitSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
    /// 应用配置
    pub app: AppSettings,
    /// LLM 配置
    pub llm: LlmSettings,
    /// 邮件配置
    pub mailer: MailerSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 工作者配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 每次唤醒最多认领的作业数
    pub claim_batch_size: usize,
    /// processing 状态超过该时长视为僵尸（秒）
    pub zombie_timeout_secs: u64,
    /// 周期性僵尸回收间隔（秒），0 表示只在启动时回收
    pub reaper_interval_secs: u64,
    /// 关闭时等待进行中作业的最长时间（秒）
    pub shutdown_timeout_secs: u64,
}

/// 退避策略配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffSettings {
    /// 基础延迟（毫秒）
    pub base_delay_ms: u64,
    /// 最大延迟（毫秒）
    pub max_delay_ms: u64,
    /// 退避策略
    pub strategy: BackoffStrategy,
}

/// 死信队列配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DeadLetterSettings {
    /// 新作业默认的最大尝试次数
    pub max_attempts: i32,
    /// 作业创建超过该时长仍失败则直接进入死信（小时）
    pub stale_after_hours: i64,
    /// 死信保留天数
    pub retention_days: i64,
    /// 清理间隔（秒）
    pub cleanup_interval_secs: u64,
}

/// 限流配置设置
///
/// `overrides` 中的条目覆盖内置默认值，未列出的类型使用 `fallback`
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default)]
    pub overrides: HashMap<String, JobRateConfig>,
    #[serde(default = "default_fallback")]
    pub fallback: JobRateConfig,
}

fn default_fallback() -> JobRateConfig {
    FALLBACK_PROFILE
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            overrides: HashMap::new(),
            fallback: FALLBACK_PROFILE,
        }
    }
}

impl RateLimitSettings {
    /// 内置默认值合并覆盖项后的完整配置
    pub fn profiles(&self) -> HashMap<String, JobRateConfig> {
        let mut profiles = default_profiles();
        profiles.extend(self.overrides.iter().map(|(k, v)| (k.clone(), *v)));
        profiles
    }
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用 Prometheus 导出器
    pub enabled: bool,
    /// 导出器监听地址
    pub listen_addr: String,
}

/// 应用配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    /// 邮件中链接使用的站点地址
    pub base_url: String,
}

/// LLM 配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base_url: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

/// 邮件配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MailerSettings {
    /// 未设置时邮件只写日志
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub from_email: String,
    pub from_name: Option<String>,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载默认值、`config/default`、`config/{APP_ENVIRONMENT}` 和
    /// `JOBRS__` 前缀的环境变量，后者覆盖前者
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("JOBRS").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// 从指定配置文件加载（不读取环境变量）
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            // Database
            .set_default("database.url", "sqlite://jobrs.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Worker
            .set_default("worker.poll_interval_ms", 1000)?
            .set_default("worker.claim_batch_size", 10)?
            .set_default("worker.zombie_timeout_secs", 300)?
            .set_default("worker.reaper_interval_secs", 0)?
            .set_default("worker.shutdown_timeout_secs", 30)?
            // Backoff
            .set_default("backoff.base_delay_ms", 100)?
            .set_default("backoff.max_delay_ms", 30_000)?
            .set_default("backoff.strategy", "full_jitter")?
            // Dead letter
            .set_default("dead_letter.max_attempts", 5)?
            .set_default("dead_letter.stale_after_hours", 24)?
            .set_default("dead_letter.retention_days", 14)?
            .set_default("dead_letter.cleanup_interval_secs", 3600)?
            // Metrics
            .set_default("metrics.enabled", true)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")?
            // App
            .set_default("app.base_url", "http://localhost:8080")?
            // LLM
            .set_default("llm.model", "gpt-3.5-turbo")?
            .set_default("llm.api_base_url", "https://api.openai.com/v1")?
            .set_default("llm.timeout_secs", 60)?
            // Mailer
            .set_default("mailer.api_base_url", "https://api.resend.com")?
            .set_default("mailer.from_email", "noreply@localhost")?
            .set_default("mailer.timeout_secs", 30)
    }

    /// 退避配置
    pub fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            base_delay: Duration::from_millis(self.backoff.base_delay_ms),
            max_delay: Duration::from_millis(self.backoff.max_delay_ms),
        }
    }

    /// 处理器配置
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            poll_interval: Duration::from_millis(self.worker.poll_interval_ms.max(1)),
            claim_batch_size: self.worker.claim_batch_size.max(1),
            backoff: self.backoff_config(),
            backoff_strategy: self.backoff.strategy,
        }
    }

    /// 死信队列配置
    pub fn dead_letter_config(&self) -> DeadLetterConfig {
        DeadLetterConfig {
            max_attempts: self.dead_letter.max_attempts.max(1),
            stale_after: chrono::Duration::hours(self.dead_letter.stale_after_hours),
            retention: chrono::Duration::days(self.dead_letter.retention_days),
        }
    }

    /// 僵尸判定阈值
    pub fn zombie_timeout(&self) -> Duration {
        Duration::from_secs(self.worker.zombie_timeout_secs)
    }

    /// 周期性僵尸回收间隔，未启用时为 `None`
    pub fn reaper_interval(&self) -> Option<Duration> {
        (self.worker.reaper_interval_secs > 0)
            .then(|| Duration::from_secs(self.worker.reaper_interval_secs))
    }

    /// 死信清理间隔
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.dead_letter.cleanup_interval_secs.max(1))
    }

    /// 关闭等待时长
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.worker.shutdown_timeout_secs)
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
