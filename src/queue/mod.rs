// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// - 退避（backoff）：失败重试的延迟计算
/// - 死信（dead_letter）：用尽重试的作业归档与重新处理
/// - 作业队列（job_queue）：生产者入口
/// - 限流（rate_limiter）：按作业类型的并发和速率准入
pub mod backoff;
pub mod dead_letter;
pub mod job_queue;
pub mod rate_limiter;
