// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 死信作业
///
/// 用尽尝试次数或过期的作业被归档到死信表，
/// 保留原作业的负载和最后一次错误，便于排查和重新处理。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterJob {
    /// 死信记录ID
    pub id: i64,
    /// 原作业ID
    pub original_job_id: i64,
    pub tenant_id: Option<String>,
    pub job_type: String,
    pub payload: Vec<u8>,
    /// 归档时的尝试次数
    pub attempt_count: i32,
    pub last_error: Option<String>,
    /// 最后一次失败的时间
    pub failed_at: DateTime<FixedOffset>,
    /// 归档时间，保留期从此刻开始计算
    pub archived_at: DateTime<FixedOffset>,
}

/// 死信队列统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeadLetterStats {
    /// 死信总数
    pub total: u64,
    /// 按作业类型分组的数量
    pub by_type: HashMap<String, u64>,
}
