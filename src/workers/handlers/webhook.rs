// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{JobContext, JobHandler};
use crate::utils::errors::JobError;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

/// `process_webhook` 负载
#[derive(Debug, Deserialize)]
pub struct ProcessWebhookPayload {
    pub webhook_id: i64,
}

/// Webhook 事件处理器
///
/// 只记录收到的事件，投递由 Webhook 子系统负责
pub struct ProcessWebhookHandler;

#[async_trait]
impl JobHandler for ProcessWebhookHandler {
    async fn handle(&self, ctx: &JobContext, payload: &[u8]) -> Result<(), JobError> {
        let data: ProcessWebhookPayload = serde_json::from_slice(payload)?;
        info!(job_id = ctx.job_id, webhook_id = data.webhook_id, "Processing webhook event");
        Ok(())
    }
}
