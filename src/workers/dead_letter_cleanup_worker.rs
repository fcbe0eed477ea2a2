// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::queue::dead_letter::DeadLetterQueue;
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 死信清理工作器
///
/// 负责定期删除超过保留期的死信
pub struct DeadLetterCleanupWorker {
    dead_letter: Arc<DeadLetterQueue>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl DeadLetterCleanupWorker {
    pub fn new(
        dead_letter: Arc<DeadLetterQueue>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            dead_letter,
            interval,
            shutdown,
        }
    }

    /// 执行一次清理
    pub async fn cleanup_once(&self) -> Result<u64, WorkerError> {
        let retention = self.dead_letter.config().retention;
        Ok(self.dead_letter.cleanup(retention).await?)
    }

    /// 运行工作器
    pub async fn run_loop(&self) {
        info!("Dead letter cleanup worker started");

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => {
                    match self.cleanup_once().await {
                        Ok(count) => {
                            if count > 0 {
                                info!("Cleaned up {} expired dead letter jobs", count);
                            }
                        }
                        Err(e) => {
                            error!("Failed to cleanup dead letter jobs: {}", e);
                        }
                    }
                }
            }
        }

        info!("Dead letter cleanup worker stopped");
    }

    /// 启动后台运行
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop().await;
        })
    }
}

#[async_trait]
impl Worker for DeadLetterCleanupWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        self.run_loop().await;
        Ok(())
    }

    fn name(&self) -> &str {
        "dead-letter-cleanup"
    }
}
