// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use crate::infrastructure::observability::metrics::JOBS_ZOMBIES_RESCUED_TOTAL;
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 僵尸作业回收器
///
/// 进程崩溃后留在 processing 状态的作业不会再被任何工作者更新，
/// 回收器把超过阈值未更新的作业放回 pending
pub struct ZombieReaper {
    /// 作业仓库
    repository: Arc<dyn JobRepository>,
    /// 判定为僵尸的未更新时长
    timeout: Duration,
    /// 周期回收间隔
    interval: Duration,
    shutdown: CancellationToken,
}

impl ZombieReaper {
    /// 创建新的回收器
    ///
    /// # 参数
    ///
    /// * `repository` - 作业仓库
    /// * `timeout` - 判定为僵尸的未更新时长
    pub fn new(repository: Arc<dyn JobRepository>, timeout: Duration) -> Self {
        Self {
            repository,
            timeout,
            interval: Duration::from_secs(60),
            shutdown: CancellationToken::new(),
        }
    }

    /// 设置周期回收的间隔和关闭令牌
    pub fn with_schedule(mut self, interval: Duration, shutdown: CancellationToken) -> Self {
        self.interval = interval;
        self.shutdown = shutdown;
        self
    }

    /// 回收一次，返回回收数量
    pub async fn rescue_zombies(&self) -> Result<u64, RepositoryError> {
        let older_than = chrono::Duration::from_std(self.timeout)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let rescued = self.repository.reclaim_stuck(older_than).await?;

        if rescued > 0 {
            counter!(JOBS_ZOMBIES_RESCUED_TOTAL).increment(rescued);
            warn!(rescued, "Rescued zombie jobs stuck in processing");
        } else {
            info!("No zombie jobs found");
        }

        Ok(rescued)
    }

    /// 周期回收，直到关闭令牌被取消
    pub async fn run_periodic(&self) {
        info!(interval_secs = self.interval.as_secs(), "Zombie reaper started");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately and startup already ran a pass
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.rescue_zombies().await {
                        error!(error = %e, "Failed to rescue zombie jobs");
                    }
                }
            }
        }

        info!("Zombie reaper stopped");
    }

    /// 启动后台运行
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_periodic().await;
        })
    }
}

#[async_trait]
impl Worker for ZombieReaper {
    async fn run(&self) -> Result<(), WorkerError> {
        self.run_periodic().await;
        Ok(())
    }

    fn name(&self) -> &str {
        "zombie-reaper"
    }
}
