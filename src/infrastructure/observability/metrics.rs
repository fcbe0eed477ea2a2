// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MetricsSettings;
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 处理耗时直方图，标签 `type`、`status`
pub const JOB_PROCESSING_SECONDS: &str = "job_processing_seconds";
/// 处理结果计数，标签 `type`、`status`
pub const JOBS_PROCESSED_TOTAL: &str = "jobs_processed_total";
/// 可重试失败计数，标签 `type`
pub const JOB_RETRIES_TOTAL: &str = "job_retries_total";
/// 进入死信队列的计数，标签 `type`
pub const JOBS_DEAD_LETTER_TOTAL: &str = "jobs_dead_letter_total";
/// 僵尸作业回收计数
pub const JOBS_ZOMBIES_RESCUED_TOTAL: &str = "jobs_zombies_rescued_total";

/// 初始化指标系统
///
/// 安装 Prometheus 导出器并注册作业指标的描述。
/// 端口被占用等安装失败只记录警告，不影响作业处理。
pub fn init_metrics(settings: &MetricsSettings) {
    let addr: SocketAddr = match settings.listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(addr = %settings.listen_addr, error = %e, "Invalid metrics address, exporter disabled");
            return;
        }
    };

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

/// 注册指标描述
pub fn describe_metrics() {
    describe_histogram!(
        JOB_PROCESSING_SECONDS,
        Unit::Seconds,
        "Time spent running a job handler"
    );
    describe_counter!(
        JOBS_PROCESSED_TOTAL,
        "Total number of job executions by type and outcome"
    );
    describe_counter!(
        JOB_RETRIES_TOTAL,
        "Total number of retryable job failures rescheduled with backoff"
    );
    describe_counter!(
        JOBS_DEAD_LETTER_TOTAL,
        "Total number of jobs moved to the dead-letter queue"
    );
    describe_counter!(
        JOBS_ZOMBIES_RESCUED_TOTAL,
        "Total number of stuck processing jobs returned to pending"
    );
}
