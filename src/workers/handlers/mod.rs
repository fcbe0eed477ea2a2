// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::{Job, JobType};
use crate::domain::services::llm_service::LLMServiceTrait;
use crate::domain::services::mailer::MailSender;
use crate::utils::errors::JobError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

pub mod ai;
pub mod email;
pub mod webhook;

pub use ai::ProcessAiHandler;
pub use email::{PasswordResetEmailHandler, SendEmailHandler, VerificationEmailHandler};
pub use webhook::ProcessWebhookHandler;

/// 处理器可见的作业信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub job_id: i64,
    pub job_type: String,
    pub tenant_id: Option<String>,
    /// 当前是第几次尝试（从 1 开始）
    pub attempt: i32,
}

impl From<&Job> for JobContext {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            job_type: job.job_type.clone(),
            tenant_id: job.tenant_id.clone(),
            attempt: job.attempt_count,
        }
    }
}

/// 作业处理器特质
///
/// 同一作业可能被执行多次，实现方需要容忍重复执行
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, ctx: &JobContext, payload: &[u8]) -> Result<(), JobError>;
}

type HandlerFn =
    dyn Fn(JobContext, Vec<u8>) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync;

/// 由闭包构成的处理器
pub struct FnHandler {
    f: Box<HandlerFn>,
}

impl FnHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(JobContext, Vec<u8>) -> BoxFuture<'static, Result<(), JobError>>
            + Send
            + Sync
            + 'static,
    {
        Self { f: Box::new(f) }
    }
}

#[async_trait]
impl JobHandler for FnHandler {
    async fn handle(&self, ctx: &JobContext, payload: &[u8]) -> Result<(), JobError> {
        (self.f)(ctx.clone(), payload.to_vec()).await
    }
}

/// 作业类型到处理器的映射
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置处理器
    ///
    /// # 参数
    ///
    /// * `mailer` - 邮件发送通道
    /// * `llm` - LLM 服务
    /// * `base_url` - 邮件链接使用的站点地址
    pub fn with_builtin_handlers(
        mailer: Arc<dyn MailSender>,
        llm: Arc<dyn LLMServiceTrait>,
        base_url: Url,
    ) -> Self {
        let mut registry = Self::new();
        registry
            .register(
                JobType::SendEmail.as_str(),
                Arc::new(SendEmailHandler::new(mailer.clone())),
            )
            .register(
                JobType::SendVerificationEmail.as_str(),
                Arc::new(VerificationEmailHandler::new(mailer.clone(), base_url.clone())),
            )
            .register(
                JobType::SendPasswordResetEmail.as_str(),
                Arc::new(PasswordResetEmailHandler::new(mailer, base_url)),
            )
            .register(
                JobType::ProcessAi.as_str(),
                Arc::new(ProcessAiHandler::new(llm)),
            )
            .register(
                JobType::ProcessWebhook.as_str(),
                Arc::new(ProcessWebhookHandler),
            );
        registry
    }

    /// 注册或替换某个类型的处理器
    pub fn register(
        &mut self,
        job_type: impl Into<String>,
        handler: Arc<dyn JobHandler>,
    ) -> &mut Self {
        self.handlers.insert(job_type.into(), handler);
        self
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// 已注册的作业类型（排序后）
    pub fn job_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// 分发作业到对应处理器
    ///
    /// 未注册的类型返回 `JobError::UnknownType`
    pub async fn dispatch(&self, ctx: &JobContext, payload: &[u8]) -> Result<(), JobError> {
        match self.handlers.get(&ctx.job_type) {
            Some(handler) => handler.handle(ctx, payload).await,
            None => Err(JobError::UnknownType(ctx.job_type.clone())),
        }
    }
}
