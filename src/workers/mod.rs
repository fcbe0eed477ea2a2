// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供作业处理和后台维护：
/// - 处理器（processor）：认领、派发和记录结果的主循环
/// - 处理器注册表（handlers）：作业类型到处理器的映射和内置处理器
/// - 僵尸回收（reaper）：恢复崩溃后遗留的 processing 作业
/// - 死信清理（dead_letter_cleanup_worker）：保留期清理
/// - 管理器（manager）：工作器生命周期和优雅关闭
pub mod dead_letter_cleanup_worker;
pub mod handlers;
pub mod manager;
pub mod processor;
pub mod reaper;
pub mod worker;

pub use worker::Worker;
