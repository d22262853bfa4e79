//! Create report archive table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReportArchive::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReportArchive::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReportArchive::UserId).string_len(32))
                    .col(ColumnDef::new(ReportArchive::Title).string_len(256).not_null())
                    .col(ColumnDef::new(ReportArchive::Category).string_len(64).not_null())
                    .col(ColumnDef::new(ReportArchive::Description).text().not_null())
                    .col(ColumnDef::new(ReportArchive::Location).string_len(512).not_null())
                    .col(ColumnDef::new(ReportArchive::Latitude).double())
                    .col(ColumnDef::new(ReportArchive::Longitude).double())
                    .col(ColumnDef::new(ReportArchive::ImagePath).string_len(1024))
                    .col(ColumnDef::new(ReportArchive::Status).string_len(32).not_null())
                    .col(
                        ColumnDef::new(ReportArchive::ModerationStatus)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReportArchive::ModerationNotes).text())
                    .col(ColumnDef::new(ReportArchive::ModeratedBy).string_len(32))
                    .col(ColumnDef::new(ReportArchive::ModeratedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ReportArchive::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportArchive::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportArchive::ArchivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(ReportArchive::ArchivedBy).string_len(32))
                    .to_owned(),
            )
            .await?;

        // Index: archived_at
        manager
            .create_index(
                Index::create()
                    .name("idx_report_archive_archived_at")
                    .table(ReportArchive::Table)
                    .col(ReportArchive::ArchivedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReportArchive::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ReportArchive {
    Table,
    Id,
    UserId,
    Title,
    Category,
    Description,
    Location,
    Latitude,
    Longitude,
    ImagePath,
    Status,
    ModerationStatus,
    ModerationNotes,
    ModeratedBy,
    ModeratedAt,
    CreatedAt,
    UpdatedAt,
    ArchivedAt,
    ArchivedBy,
}
