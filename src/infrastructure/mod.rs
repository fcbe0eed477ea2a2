// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 提供领域层接口的技术实现：
/// - 数据库（database）：连接池和实体映射
/// - 可观测性（observability）：Prometheus 指标
/// - 仓库实现（repositories）：作业和死信仓库
/// - 服务实现（services）：广播和邮件发送
pub mod database;
pub mod observability;
pub mod repositories;
pub mod services;
