// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含作业实体、仓库接口和外部能力接口
pub mod domain;

/// 基础设施模块
///
/// 提供数据库、指标、邮件和广播的具体实现
pub mod infrastructure;

/// 队列模块
///
/// 实现入队、退避、限流和死信
pub mod queue;

/// 工具模块
///
/// 提供错误类型、错误分类和日志初始化
pub mod utils;

/// 工作器模块
///
/// 实现作业处理主循环和后台维护工作器
pub mod workers;
