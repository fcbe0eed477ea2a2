// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工具模块
///
/// - 错误（errors）：作业和工作器错误类型
/// - 重试策略（retry_policy）：错误分类和 retry-after 解析
/// - 遥测（telemetry）：日志初始化
pub mod errors;
pub mod retry_policy;
pub mod telemetry;
