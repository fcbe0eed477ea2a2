// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::{JobContext, JobHandler};
use crate::domain::services::mailer::{MailSender, OutgoingEmail};
use crate::utils::errors::JobError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use url::Url;
use validator::Validate;

/// `send_email` 负载
#[derive(Debug, Deserialize, Validate)]
pub struct SendEmailPayload {
    #[validate(email)]
    pub to: String,
    #[validate(length(min = 1))]
    pub subject: String,
    pub body: String,
}

/// 验证邮件和重置密码邮件的负载
#[derive(Debug, Deserialize, Validate)]
pub struct EmailTokenPayload {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub token: String,
}

fn decode<T>(payload: &[u8]) -> Result<T, JobError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let data: T = serde_json::from_slice(payload)?;
    data.validate()?;
    Ok(data)
}

/// 在站点地址后拼接路径并附加 token 查询参数
fn token_link(base_url: &Url, path: &str, token: &str) -> Result<Url, JobError> {
    let mut link = Url::parse(&format!(
        "{}/{}",
        base_url.as_str().trim_end_matches('/'),
        path
    ))
    .map_err(|e| JobError::Rejected(format!("invalid link base {}: {}", base_url, e)))?;
    link.query_pairs_mut().append_pair("token", token);
    Ok(link)
}

/// 通用邮件处理器
pub struct SendEmailHandler {
    mailer: Arc<dyn MailSender>,
}

impl SendEmailHandler {
    pub fn new(mailer: Arc<dyn MailSender>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl JobHandler for SendEmailHandler {
    async fn handle(&self, ctx: &JobContext, payload: &[u8]) -> Result<(), JobError> {
        let data: SendEmailPayload = decode(payload)?;

        self.mailer
            .send(&OutgoingEmail {
                to: data.to,
                subject: data.subject,
                body: data.body,
            })
            .await?;

        info!(job_id = ctx.job_id, "Email sent");
        Ok(())
    }
}

/// 注册验证邮件处理器
pub struct VerificationEmailHandler {
    mailer: Arc<dyn MailSender>,
    base_url: Url,
}

impl VerificationEmailHandler {
    pub fn new(mailer: Arc<dyn MailSender>, base_url: Url) -> Self {
        Self { mailer, base_url }
    }
}

#[async_trait]
impl JobHandler for VerificationEmailHandler {
    async fn handle(&self, ctx: &JobContext, payload: &[u8]) -> Result<(), JobError> {
        let data: EmailTokenPayload = decode(payload)?;
        let link = token_link(&self.base_url, "verify-email", &data.token)?;

        self.mailer
            .send(&OutgoingEmail {
                to: data.email,
                subject: "Verify your email".to_string(),
                body: format!(
                    "Hello,\n\nWelcome! Click the link below to verify your email:\n\n{}",
                    link
                ),
            })
            .await?;

        info!(job_id = ctx.job_id, "Verification email sent");
        Ok(())
    }
}

/// 重置密码邮件处理器
pub struct PasswordResetEmailHandler {
    mailer: Arc<dyn MailSender>,
    base_url: Url,
}

impl PasswordResetEmailHandler {
    pub fn new(mailer: Arc<dyn MailSender>, base_url: Url) -> Self {
        Self { mailer, base_url }
    }
}

#[async_trait]
impl JobHandler for PasswordResetEmailHandler {
    async fn handle(&self, ctx: &JobContext, payload: &[u8]) -> Result<(), JobError> {
        let data: EmailTokenPayload = decode(payload)?;
        let link = token_link(&self.base_url, "reset-password", &data.token)?;

        self.mailer
            .send(&OutgoingEmail {
                to: data.email,
                subject: "Password reset".to_string(),
                body: format!(
                    "Hello,\n\nClick the link below to reset your password:\n\n{}\n\nThis link expires in 1 hour.",
                    link
                ),
            })
            .await?;

        info!(job_id = ctx.job_id, "Password reset email sent");
        Ok(())
    }
}
