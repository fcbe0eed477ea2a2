// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 定义领域层的持久化抽象，具体实现由基础设施层提供：
/// - 作业仓库（job_repository）：入队、认领、完成、失败重排和僵尸回收
/// - 死信仓库（dead_letter_repository）：归档、重新处理和保留期清理
pub mod dead_letter_repository;
pub mod job_repository;
