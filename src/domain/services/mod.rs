// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 作业处理器依赖的外部能力接口：
/// - 广播（broadcaster）：作业完成后的事件通知
/// - LLM服务（llm_service）：AI 作业调用的大语言模型
/// - 邮件（mailer）：邮件类作业的发送通道
pub mod broadcaster;
pub mod llm_service;
pub mod mailer;
