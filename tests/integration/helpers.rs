// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use jobrs::domain::services::broadcaster::Broadcaster;
use jobrs::domain::services::mailer::{MailSender, OutgoingEmail};
use jobrs::infrastructure::database::entities::{dead_letter_job, job as job_entity};
use migration::{Migrator, MigratorTrait};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// 单连接的内存 SQLite，已执行迁移
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to connect to database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    Arc::new(db)
}

/// 文件 SQLite 连接池，用于多连接并发测试
pub async fn setup_file_db(dir: &Path, max_connections: u32) -> Arc<DatabaseConnection> {
    let url = format!("sqlite://{}?mode=rwc", dir.join("jobs.db").display());
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(max_connections)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to connect to database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    Arc::new(db)
}

/// 直接改写作业的 updated_at，模拟长时间停留在 processing
pub async fn set_job_updated_at(db: &DatabaseConnection, id: i64, at: DateTime<FixedOffset>) {
    job_entity::Entity::update_many()
        .col_expr(job_entity::Column::UpdatedAt, Expr::value(at))
        .filter(job_entity::Column::Id.eq(id))
        .exec(db)
        .await
        .expect("Failed to update job");
}

pub async fn set_job_created_at(db: &DatabaseConnection, id: i64, at: DateTime<FixedOffset>) {
    job_entity::Entity::update_many()
        .col_expr(job_entity::Column::CreatedAt, Expr::value(at))
        .filter(job_entity::Column::Id.eq(id))
        .exec(db)
        .await
        .expect("Failed to update job");
}

pub async fn set_archived_at(db: &DatabaseConnection, id: i64, at: DateTime<FixedOffset>) {
    dead_letter_job::Entity::update_many()
        .col_expr(dead_letter_job::Column::ArchivedAt, Expr::value(at))
        .filter(dead_letter_job::Column::Id.eq(id))
        .exec(db)
        .await
        .expect("Failed to update dead letter job");
}

/// 记录所有广播的测试实现
#[derive(Default)]
pub struct RecordingBroadcaster {
    pub events: Mutex<Vec<(Option<i64>, String, String)>>,
}

impl RecordingBroadcaster {
    pub fn events(&self) -> Vec<(Option<i64>, String, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, event: &str, data: &str) {
        self.events
            .lock()
            .unwrap()
            .push((None, event.to_string(), data.to_string()));
    }

    fn broadcast_to_user(&self, user_id: i64, event: &str, data: &str) {
        self.events
            .lock()
            .unwrap()
            .push((Some(user_id), event.to_string(), data.to_string()));
    }
}

/// 记录所有邮件的测试实现
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}
