// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MailerSettings;
use crate::domain::services::mailer::{MailSender, OutgoingEmail};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// HTTP 邮件服务实现
///
/// 对接 Resend 风格的 `POST {base}/emails` 接口
pub struct HttpMailSender {
    /// HTTP 客户端
    client: reqwest::Client,
    api_key: String,
    api_base_url: String,
    /// 发件人，形如 `Name <addr>` 或 `addr`
    from: String,
}

impl HttpMailSender {
    /// 创建新的 HTTP 邮件服务
    pub fn new(api_key: String, api_base_url: String, from: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key,
            api_base_url,
            from,
        }
    }

    /// 根据配置创建，未配置 API 密钥时返回 `None`
    pub fn from_settings(settings: &MailerSettings) -> Option<Self> {
        let api_key = settings.api_key.clone().filter(|k| !k.is_empty())?;
        let from = match settings.from_name.as_deref() {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, settings.from_email),
            _ => settings.from_email.clone(),
        };

        Some(Self::new(
            api_key,
            settings.api_base_url.clone(),
            from,
            Duration::from_secs(settings.timeout_secs),
        ))
    }
}

#[async_trait]
impl MailSender for HttpMailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let request = SendEmailRequest {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.body,
        };

        let url = format!("{}/emails", self.api_base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| format!(", retry-after: {}", v))
                .unwrap_or_default();
            return Err(anyhow!("mail provider rate limit exceeded (429{})", retry_after));
        }

        let body = response.text().await.unwrap_or_default();
        Err(anyhow!(
            "Mail delivery failed with status {}: {}",
            status,
            body
        ))
    }
}

/// 仅记录日志的邮件实现
///
/// 未配置邮件服务时使用，便于本地开发
#[derive(Debug, Default, Clone)]
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            body_len = email.body.len(),
            "Mail sender not configured, email logged only"
        );
        Ok(())
    }
}
