//! Add moderation columns to the report table.
//!
//! Rows that existed before moderation was introduced are backfilled as
//! `approved` through the column default, so they stay public.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Column whose presence marks this migration as applied.
pub const MARKER_COLUMN: &str = "moderation_status";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Report::Table)
                    .add_column(
                        ColumnDef::new(Report::ModerationStatus)
                            .string_len(32)
                            .not_null()
                            .default("approved"),
                    )
                    .add_column(ColumnDef::new(Report::ModerationNotes).text().null())
                    .add_column(ColumnDef::new(Report::ModeratedBy).string_len(32).null())
                    .add_column(
                        ColumnDef::new(Report::ModeratedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (moderation_status, created_at) for the public feed and the queue
        manager
            .create_index(
                Index::create()
                    .name("idx_report_moderation_status_created_at")
                    .table(Report::Table)
                    .col(Report::ModerationStatus)
                    .col(Report::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_report_moderation_status_created_at")
                    .table(Report::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Report::Table)
                    .drop_column(Report::ModerationStatus)
                    .drop_column(Report::ModerationNotes)
                    .drop_column(Report::ModeratedBy)
                    .drop_column(Report::ModeratedAt)
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
enum Report {
    Table,
    ModerationStatus,
    ModerationNotes,
    ModeratedBy,
    ModeratedAt,
    CreatedAt,
}
