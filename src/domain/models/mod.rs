// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了队列的核心实体：
/// - 作业（job）：持久化队列中的工作单元
/// - 死信作业（dead_letter）：用尽重试后归档的作业
pub mod dead_letter;
pub mod job;
