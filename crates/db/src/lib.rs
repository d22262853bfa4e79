//! Database layer for civic-report.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use civic_common::{AppError, Config};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::SchemaManager;
use std::time::Duration;
use tracing::log::LevelFilter;

/// Initialize database connection.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(&config.database.url);

    opt.max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Whether the moderation migration has been applied to this schema.
///
/// Checked once at startup; the result becomes part of the immutable
/// capability set.
pub async fn has_moderation_schema(db: &DatabaseConnection) -> Result<bool, AppError> {
    SchemaManager::new(db)
        .has_column(
            "report",
            migrations::m20250101_000003_add_report_moderation::MARKER_COLUMN,
        )
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
