// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use jobrs::domain::models::job::JobType;
use jobrs::domain::services::llm_service::LLMService;
use jobrs::infrastructure::services::mail_sender_impl::HttpMailSender;
use jobrs::utils::errors::JobError;
use jobrs::workers::handlers::{HandlerRegistry, JobContext};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ctx(job_type: JobType) -> JobContext {
    JobContext {
        job_id: 1,
        job_type: job_type.to_string(),
        tenant_id: Some("42".to_string()),
        attempt: 1,
    }
}

fn registry_for(server: &MockServer) -> HandlerRegistry {
    let mailer = HttpMailSender::new(
        "mail-key".to_string(),
        server.uri(),
        "noreply@example.com".to_string(),
        Duration::from_secs(5),
    );
    let llm = LLMService::new_with_config(
        "llm-key".to_string(),
        "test-model".to_string(),
        server.uri(),
    );

    HandlerRegistry::with_builtin_handlers(
        Arc::new(mailer),
        Arc::new(llm),
        Url::parse("https://app.example.com/").unwrap(),
    )
}

#[tokio::test]
async fn test_builtin_registry_covers_every_job_type() {
    let server = MockServer::start().await;
    let registry = registry_for(&server);

    for job_type in JobType::ALL {
        assert!(registry.contains(job_type.as_str()), "{} missing", job_type);
    }
    assert_eq!(registry.job_types().len(), JobType::ALL.len());
}

#[tokio::test]
async fn test_password_reset_email_goes_through_mail_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer mail-key"))
        .and(body_string_contains("https://app.example.com/reset-password?token=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "em_1"})))
        .expect(1)
        .mount(&server)
        .await;
    let registry = registry_for(&server);

    let payload = serde_json::to_vec(&json!({"email": "user@example.com", "token": "abc123"})).unwrap();
    registry
        .dispatch(&ctx(JobType::SendPasswordResetEmail), &payload)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_mail_provider_rate_limit_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .mount(&server)
        .await;
    let registry = registry_for(&server);

    let payload = serde_json::to_vec(&json!({
        "to": "user@example.com",
        "subject": "Hi",
        "body": "hello"
    }))
    .unwrap();
    let err = registry
        .dispatch(&ctx(JobType::SendEmail), &payload)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(err.message().contains("retry-after: 30"));
}

#[tokio::test]
async fn test_ai_job_calls_completion_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "done"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
        })))
        .expect(1)
        .mount(&server)
        .await;
    let registry = registry_for(&server);

    let payload = serde_json::to_vec(&json!({"prompt": "summarize"})).unwrap();
    registry
        .dispatch(&ctx(JobType::ProcessAi), &payload)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_invalid_payloads_are_permanent_failures() {
    let server = MockServer::start().await;
    let registry = registry_for(&server);

    let not_json = registry
        .dispatch(&ctx(JobType::ProcessWebhook), b"not json")
        .await
        .unwrap_err();
    assert!(matches!(not_json, JobError::InvalidPayload(_)));
    assert!(not_json.is_permanent());

    let bad_email = serde_json::to_vec(&json!({"email": "nope", "token": "t"})).unwrap();
    let err = registry
        .dispatch(&ctx(JobType::SendVerificationEmail), &bad_email)
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::InvalidPayload(_)));

    let empty_prompt = serde_json::to_vec(&json!({"prompt": ""})).unwrap();
    let err = registry
        .dispatch(&ctx(JobType::ProcessAi), &empty_prompt)
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::InvalidPayload(_)));
}
