// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::workers::worker::Worker;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 工作管理器
///
/// 启动后台工作器，收到关闭信号后取消共享令牌并等待它们退出
pub struct WorkerManager {
    shutdown: CancellationToken,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl WorkerManager {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    /// 工作器应使用的关闭令牌
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 启动工作器
    pub fn spawn(&mut self, worker: Arc<dyn Worker>) {
        let name = worker.name().to_string();
        info!(worker = %name, "Starting worker");

        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                error!(worker = %task_name, error = %e, "Worker exited with error");
            }
        });
        self.handles.push((name, handle));
    }

    /// 等待关闭信号并关闭工作进程
    ///
    /// 超过 `timeout` 仍未退出的工作器会被中止
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }

        self.shutdown(timeout).await;
    }

    /// 取消令牌并等待所有工作器退出
    pub async fn shutdown(self, timeout: Duration) {
        info!("Shutting down workers...");
        self.shutdown.cancel();

        for (name, mut handle) in self.handles {
            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(())) => info!(worker = %name, "Worker stopped"),
                Ok(Err(e)) => error!(worker = %name, error = %e, "Worker task failed"),
                Err(_) => {
                    warn!(worker = %name, "Worker did not stop in time, aborting");
                    handle.abort();
                }
            }
        }

        info!("Workers shut down successfully");
    }
}
