// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 创建死信队列表
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeadLetterJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeadLetterJobs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeadLetterJobs::OriginalJobId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeadLetterJobs::TenantId).string().null())
                    .col(ColumnDef::new(DeadLetterJobs::JobType).string().not_null())
                    .col(ColumnDef::new(DeadLetterJobs::Payload).binary().not_null())
                    .col(
                        ColumnDef::new(DeadLetterJobs::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(DeadLetterJobs::LastError).text().null())
                    .col(
                        ColumnDef::new(DeadLetterJobs::FailedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeadLetterJobs::ArchivedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_dead_letter_jobs_archived_at")
                    .table(DeadLetterJobs::Table)
                    .col(DeadLetterJobs::ArchivedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_dead_letter_jobs_job_type")
                    .table(DeadLetterJobs::Table)
                    .col(DeadLetterJobs::JobType)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeadLetterJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DeadLetterJobs {
    Table,
    Id,
    OriginalJobId,
    TenantId,
    JobType,
    Payload,
    AttemptCount,
    LastError,
    FailedAt,
    ArchivedAt,
}
