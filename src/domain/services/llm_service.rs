// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::settings::LlmSettings;

/// 单次提示最多发送的字符数
const MAX_PROMPT_CHARS: usize = 10_000;

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[async_trait]
pub trait LLMServiceTrait: Send + Sync {
    /// 发送提示并返回模型回复
    async fn complete(&self, prompt: &str) -> Result<(String, TokenUsage)>;
}

/// LLM服务 - 处理与LLM提供商的交互
///
/// 使用 OpenAI 兼容的 `/chat/completions` 接口。
/// 上游返回非 2xx 时，错误信息包含状态码和 `Retry-After` 提示，
/// 以便重试策略识别限流并推迟下一次尝试。
pub struct LLMService {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    api_base_url: String,
}

#[async_trait]
impl LLMServiceTrait for LLMService {
    async fn complete(&self, prompt: &str) -> Result<(String, TokenUsage)> {
        LLMService::complete(self, prompt).await
    }
}

impl LLMService {
    /// 从配置创建
    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self {
            client: build_client(settings.timeout_secs),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            api_base_url: settings.api_base_url.clone(),
        }
    }

    pub fn new_with_config(api_key: String, model: String, api_base_url: String) -> Self {
        Self {
            client: build_client(60),
            api_key: Some(api_key),
            model,
            api_base_url,
        }
    }

    /// 调用LLM补全
    ///
    /// # 参数
    /// * `prompt` - 用户提示，超长部分会被截断
    ///
    /// # 返回值
    /// * `Result<(String, TokenUsage)>` - 模型回复和令牌使用情况
    ///
    /// # 错误
    /// * 当LLM API密钥未配置时返回错误
    /// * 当LLM服务调用失败或响应格式不正确时返回错误
    pub async fn complete(&self, prompt: &str) -> Result<(String, TokenUsage)> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("LLM API key not configured"))?;

        let truncated: String = prompt.chars().take(MAX_PROMPT_CHARS).collect();

        let request_body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": truncated
                }
            ]
        });

        let url = format!("{}/chat/completions", self.api_base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to LLM API")?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| format!(" (retry-after: {})", v))
                .unwrap_or_default();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "LLM API returned error: {}{} - {}",
                status,
                retry_after,
                error_text
            ));
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse LLM API response")?;

        let usage = if let Some(usage_val) = body.get("usage") {
            TokenUsage {
                prompt_tokens: usage_val["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: usage_val["completion_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: usage_val["total_tokens"].as_u64().unwrap_or(0) as u32,
            }
        } else {
            TokenUsage::default()
        };

        match body["choices"][0]["message"]["content"].as_str() {
            Some(content) => Ok((content.trim().to_string(), usage)),
            None => Err(anyhow::anyhow!("Invalid response format from LLM API")),
        }
    }
}

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}
