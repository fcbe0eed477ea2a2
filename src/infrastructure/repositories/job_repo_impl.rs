// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::job::{Job, JobStatus, NewJob};
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use crate::infrastructure::database::entities::{job as job_entity, processed_job};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType, OnConflict, Query},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    EntityTrait, Order, PaginatorTrait, QueryFilter, Set, SqlErr, TransactionTrait,
};
use std::sync::Arc;

/// 新作业默认的最大尝试次数
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// 作业仓库实现
///
/// 基于SeaORM实现的作业数据访问层，同时支持 Postgres 和 SQLite
#[derive(Clone)]
pub struct JobRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
    /// 未指定时使用的最大尝试次数
    default_max_attempts: i32,
}

impl JobRepositoryImpl {
    /// 创建新的作业仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的作业仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// 设置新作业默认的最大尝试次数
    pub fn with_default_max_attempts(mut self, max_attempts: i32) -> Self {
        self.default_max_attempts = max_attempts.max(1);
        self
    }

    async fn record_processed_on<C: ConnectionTrait>(
        conn: &C,
        id: i64,
        now: DateTime<FixedOffset>,
    ) -> Result<(), RepositoryError> {
        let entry = processed_job::ActiveModel {
            job_id: Set(id),
            processed_at: Set(now),
        };

        processed_job::Entity::insert(entry)
            .on_conflict(
                OnConflict::column(processed_job::Column::JobId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn mark_completed_on<C: ConnectionTrait>(
        conn: &C,
        id: i64,
        now: DateTime<FixedOffset>,
    ) -> Result<(), RepositoryError> {
        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(JobStatus::Completed.to_string()),
            )
            .col_expr(job_entity::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(now))
            .filter(job_entity::Column::Id.eq(id))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// 统一转换为 UTC 偏移
///
/// SQLite 以文本保存时间戳，只有偏移一致时文本比较才与时间先后一致
fn to_utc(at: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    at.with_timezone(&Utc).into()
}

/// 构造待插入的作业行
///
/// 死信重新处理也通过这里生成新作业，保证默认值一致
pub(crate) fn new_job_model(
    job: NewJob,
    default_max_attempts: i32,
    now: DateTime<FixedOffset>,
) -> job_entity::ActiveModel {
    job_entity::ActiveModel {
        tenant_id: Set(job.tenant_id),
        job_type: Set(job.job_type),
        payload: Set(job.payload),
        status: Set(JobStatus::Pending.to_string()),
        idempotency_key: Set(job.idempotency_key),
        attempt_count: Set(0),
        max_attempts: Set(job.max_attempts.unwrap_or(default_max_attempts)),
        last_error: Set(None),
        run_at: Set(to_utc(job.run_at.unwrap_or(now))),
        started_at: Set(None),
        completed_at: Set(None),
        created_at: Set(to_utc(now)),
        updated_at: Set(to_utc(now)),
        ..Default::default()
    }
}

impl From<job_entity::Model> for Job {
    fn from(model: job_entity::Model) -> Self {
        Self {
            id: model.id,
            tenant_id: model.tenant_id,
            job_type: model.job_type,
            payload: model.payload,
            status: model.status.parse().unwrap_or_default(),
            idempotency_key: model.idempotency_key,
            attempt_count: model.attempt_count,
            max_attempts: model.max_attempts,
            last_error: model.last_error,
            run_at: model.run_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[async_trait]
impl JobRepository for JobRepositoryImpl {
    async fn enqueue(&self, job: NewJob) -> Result<Job, RepositoryError> {
        let key = job.idempotency_key.clone();
        let model = new_job_model(job, self.default_max_attempts, Utc::now().into());

        match model.insert(self.db.as_ref()).await {
            Ok(inserted) => Ok(inserted.into()),
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    Err(RepositoryError::Duplicate(key.unwrap_or_default()))
                }
                _ => Err(err.into()),
            },
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Job>, RepositoryError> {
        let model = job_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn claim_next(&self) -> Result<Option<Job>, RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        let mut candidate = Query::select();
        candidate
            .column(job_entity::Column::Id)
            .from(job_entity::Entity)
            .and_where(job_entity::Column::Status.eq(JobStatus::Pending.to_string()))
            .and_where(job_entity::Column::RunAt.lte(now))
            .order_by(job_entity::Column::RunAt, Order::Asc)
            .order_by(job_entity::Column::Id, Order::Asc)
            .limit(1);

        // SQLite serializes writers, Postgres needs row locks to keep workers apart
        if self.db.get_database_backend() == DatabaseBackend::Postgres {
            candidate.lock_with_behavior(LockType::Update, LockBehavior::SkipLocked);
        }

        let claimed = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(JobStatus::Processing.to_string()),
            )
            .col_expr(job_entity::Column::StartedAt, Expr::value(Some(now)))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                job_entity::Column::AttemptCount,
                Expr::col(job_entity::Column::AttemptCount).add(1),
            )
            .filter(job_entity::Column::Id.in_subquery(candidate))
            .filter(job_entity::Column::Status.eq(JobStatus::Pending.to_string()))
            .exec_with_returning(self.db.as_ref())
            .await?;

        Ok(claimed.into_iter().next().map(Into::into))
    }

    async fn mark_completed(&self, id: i64) -> Result<(), RepositoryError> {
        Self::mark_completed_on(self.db.as_ref(), id, Utc::now().into()).await
    }

    async fn mark_failed(
        &self,
        id: i64,
        error: &str,
        retry_at: DateTime<FixedOffset>,
    ) -> Result<(), RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(JobStatus::Pending.to_string()),
            )
            .col_expr(
                job_entity::Column::LastError,
                Expr::value(Some(error.to_string())),
            )
            .col_expr(job_entity::Column::RunAt, Expr::value(to_utc(retry_at)))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(now))
            .filter(job_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_dead(&self, id: i64, error: &str) -> Result<(), RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(JobStatus::Failed.to_string()),
            )
            .col_expr(
                job_entity::Column::LastError,
                Expr::value(Some(error.to_string())),
            )
            .col_expr(job_entity::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(now))
            .filter(job_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn record_processed(&self, id: i64) -> Result<(), RepositoryError> {
        Self::record_processed_on(self.db.as_ref(), id, Utc::now().into()).await
    }

    async fn is_processed(&self, id: i64) -> Result<bool, RepositoryError> {
        let count = processed_job::Entity::find()
            .filter(processed_job::Column::JobId.eq(id))
            .count(self.db.as_ref())
            .await?;
        Ok(count > 0)
    }

    async fn complete_processed(&self, id: i64) -> Result<(), RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();
        let txn = self.db.begin().await?;

        Self::record_processed_on(&txn, id, now).await?;
        Self::mark_completed_on(&txn, id, now).await?;

        txn.commit().await?;
        Ok(())
    }

    async fn reclaim_stuck(&self, older_than: chrono::Duration) -> Result<u64, RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();
        let threshold = now - older_than;

        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(JobStatus::Pending.to_string()),
            )
            .col_expr(
                job_entity::Column::AttemptCount,
                Expr::col(job_entity::Column::AttemptCount).add(1),
            )
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(now))
            .filter(job_entity::Column::Status.eq(JobStatus::Processing.to_string()))
            .filter(job_entity::Column::UpdatedAt.lt(threshold))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }

    async fn cancel(&self, id: i64) -> Result<bool, RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(JobStatus::Cancelled.to_string()),
            )
            .col_expr(job_entity::Column::CompletedAt, Expr::value(Some(now)))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(now))
            .filter(job_entity::Column::Id.eq(id))
            .filter(job_entity::Column::Status.eq(JobStatus::Pending.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<u64, RepositoryError> {
        let count = job_entity::Entity::find()
            .filter(job_entity::Column::Status.eq(status.to_string()))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }
}
