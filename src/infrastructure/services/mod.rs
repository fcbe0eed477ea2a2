// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 外部能力的具体实现
///
/// - 广播（channel_broadcaster）：基于 tokio broadcast 通道
/// - 邮件（mail_sender_impl）：HTTP 邮件接口和日志实现
pub mod channel_broadcaster;
pub mod mail_sender_impl;
