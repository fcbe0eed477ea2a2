// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{JobContext, JobHandler};
use crate::domain::services::llm_service::LLMServiceTrait;
use crate::utils::errors::JobError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// `process_ai` 负载
#[derive(Debug, Deserialize, Validate)]
pub struct ProcessAiPayload {
    #[validate(length(min = 1))]
    pub prompt: String,
}

/// AI 作业处理器
pub struct ProcessAiHandler {
    llm: Arc<dyn LLMServiceTrait>,
}

impl ProcessAiHandler {
    pub fn new(llm: Arc<dyn LLMServiceTrait>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl JobHandler for ProcessAiHandler {
    async fn handle(&self, ctx: &JobContext, payload: &[u8]) -> Result<(), JobError> {
        let data: ProcessAiPayload = serde_json::from_slice(payload)?;
        data.validate()?;

        let (response, usage) = self.llm.complete(&data.prompt).await?;

        info!(
            job_id = ctx.job_id,
            response_chars = response.chars().count(),
            total_tokens = usage.total_tokens,
            "AI job completed"
        );
        Ok(())
    }
}
