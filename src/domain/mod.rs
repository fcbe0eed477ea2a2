// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// - 领域模型（models）：作业与死信实体
/// - 仓库接口（repositories）：数据持久化抽象接口
/// - 服务（services）：处理器依赖的外部能力（邮件、LLM、广播）
pub mod models;
pub mod repositories;
pub mod services;
