// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::broadcaster::Broadcaster;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// 广播出去的一条通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// 目标用户，`None` 表示全体
    pub user_id: Option<i64>,
    pub event: String,
    pub data: String,
}

/// 基于 tokio broadcast 通道的广播实现
///
/// 没有订阅者或订阅者落后时直接丢弃通知，不会阻塞发送方
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<Notification>,
}

impl ChannelBroadcaster {
    /// 创建广播器
    ///
    /// # 参数
    ///
    /// * `capacity` - 每个订阅者可缓冲的通知数量
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 订阅通知
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    fn publish(&self, notification: Notification) {
        if let Err(e) = self.sender.send(notification) {
            debug!(event = %e.0.event, "No subscribers for notification");
        }
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn broadcast(&self, event: &str, data: &str) {
        self.publish(Notification {
            user_id: None,
            event: event.to_string(),
            data: data.to_string(),
        });
    }

    fn broadcast_to_user(&self, user_id: i64, event: &str, data: &str) {
        self.publish(Notification {
            user_id: Some(user_id),
            event: event.to_string(),
            data: data.to_string(),
        });
    }
}
