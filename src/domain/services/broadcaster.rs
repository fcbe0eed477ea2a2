// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 作业完成通知的事件名
pub const JOB_COMPLETED_EVENT: &str = "job_completed";

/// 事件广播接口
///
/// 调用方不等待投递结果，实现方不得阻塞处理器。
pub trait Broadcaster: Send + Sync {
    /// 向所有订阅者广播
    fn broadcast(&self, event: &str, data: &str);

    /// 向指定用户广播
    fn broadcast_to_user(&self, user_id: i64, event: &str, data: &str);
}
