// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::dead_letter::DeadLetterJob;
use crate::domain::models::job::{Job, NewJob};
use crate::domain::repositories::dead_letter_repository::DeadLetterRepository;
use crate::domain::repositories::job_repository::RepositoryError;
use crate::infrastructure::database::entities::{dead_letter_job, job as job_entity};
use crate::infrastructure::repositories::job_repo_impl::new_job_model;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;

/// 死信仓库实现
#[derive(Clone)]
pub struct DeadLetterRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl DeadLetterRepositoryImpl {
    /// 创建新的死信仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<dead_letter_job::Model> for DeadLetterJob {
    fn from(model: dead_letter_job::Model) -> Self {
        Self {
            id: model.id,
            original_job_id: model.original_job_id,
            tenant_id: model.tenant_id,
            job_type: model.job_type,
            payload: model.payload,
            attempt_count: model.attempt_count,
            last_error: model.last_error,
            failed_at: model.failed_at,
            archived_at: model.archived_at,
        }
    }
}

#[async_trait]
impl DeadLetterRepository for DeadLetterRepositoryImpl {
    async fn archive(&self, job: &Job, last_error: &str) -> Result<DeadLetterJob, RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();
        let txn = self.db.begin().await?;

        let archived = dead_letter_job::ActiveModel {
            original_job_id: Set(job.id),
            tenant_id: Set(job.tenant_id.clone()),
            job_type: Set(job.job_type.clone()),
            payload: Set(job.payload.clone()),
            attempt_count: Set(job.attempt_count),
            last_error: Set(Some(last_error.to_string())),
            failed_at: Set(now),
            archived_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let deleted = job_entity::Entity::delete_by_id(job.id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            txn.rollback().await?;
            return Err(RepositoryError::NotFound);
        }

        txn.commit().await?;
        Ok(archived.into())
    }

    async fn restore(&self, id: i64, max_attempts: i32) -> Result<Job, RepositoryError> {
        let txn = self.db.begin().await?;

        let Some(archived) = dead_letter_job::Entity::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Err(RepositoryError::NotFound);
        };

        let mut fresh = NewJob::new(archived.job_type, archived.payload);
        fresh.tenant_id = archived.tenant_id;

        let job = new_job_model(fresh, max_attempts, Utc::now().into())
            .insert(&txn)
            .await?;

        dead_letter_job::Entity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        Ok(job.into())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<DeadLetterJob>, RepositoryError> {
        let model = dead_letter_job::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn list(&self, limit: u64) -> Result<Vec<DeadLetterJob>, RepositoryError> {
        let models = dead_letter_job::Entity::find()
            .order_by_desc(dead_letter_job::Column::ArchivedAt)
            .order_by_desc(dead_letter_job::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(DeadLetterJob::from).collect())
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = dead_letter_job::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn purge_archived_before(
        &self,
        cutoff: DateTime<FixedOffset>,
    ) -> Result<u64, RepositoryError> {
        let result = dead_letter_job::Entity::delete_many()
            .filter(dead_letter_job::Column::ArchivedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count = dead_letter_job::Entity::find()
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }

    async fn count_by_type(&self) -> Result<HashMap<String, u64>, RepositoryError> {
        let rows: Vec<(String, i64)> = dead_letter_job::Entity::find()
            .select_only()
            .column(dead_letter_job::Column::JobType)
            .column_as(Expr::col(dead_letter_job::Column::Id).count(), "count")
            .group_by(dead_letter_job::Column::JobType)
            .into_tuple()
            .all(self.db.as_ref())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(job_type, count)| (job_type, count.max(0) as u64))
            .collect())
    }
}
