//! Archived report entity.
//!
//! Append-only copy of a report taken right before it leaves the live table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::report::{self, ModerationStatus, ReportStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "report_archive")]
pub struct Model {
    /// Same ID the live report had
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(nullable)]
    pub user_id: Option<String>,
    pub title: String,
    pub category: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub location: String,
    #[sea_orm(column_type = "Double", nullable)]
    pub latitude: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub longitude: Option<f64>,
    #[sea_orm(nullable)]
    pub image_path: Option<String>,
    pub status: ReportStatus,
    pub moderation_status: ModerationStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub moderation_notes: Option<String>,
    #[sea_orm(nullable)]
    pub moderated_by: Option<String>,
    #[sea_orm(nullable)]
    pub moderated_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub archived_at: DateTimeWithTimeZone,
    /// Admin who archived the report
    #[sea_orm(nullable)]
    pub archived_by: Option<String>,
}

impl Model {
    /// Build the archive row for `report`.
    #[must_use]
    pub fn from_report(
        report: report::Model,
        archived_by: Option<String>,
        archived_at: DateTimeWithTimeZone,
    ) -> Self {
        Self {
            id: report.id,
            user_id: report.user_id,
            title: report.title,
            category: report.category,
            description: report.description,
            location: report.location,
            latitude: report.latitude,
            longitude: report.longitude,
            image_path: report.image_path,
            status: report.status,
            moderation_status: report.moderation_status,
            moderation_notes: report.moderation_notes,
            moderated_by: report.moderated_by,
            moderated_at: report.moderated_at,
            created_at: report.created_at,
            updated_at: report.updated_at,
            archived_at,
            archived_by,
        }
    }

    /// Whether this archive row carries every field of `report` unchanged.
    #[must_use]
    pub fn preserves(&self, report: &report::Model) -> bool {
        self.id == report.id
            && self.user_id == report.user_id
            && self.title == report.title
            && self.category == report.category
            && self.description == report.description
            && self.location == report.location
            && self.latitude == report.latitude
            && self.longitude == report.longitude
            && self.image_path == report.image_path
            && self.status == report.status
            && self.moderation_status == report.moderation_status
            && self.moderation_notes == report.moderation_notes
            && self.moderated_by == report.moderated_by
            && self.moderated_at == report.moderated_at
            && self.created_at == report.created_at
            && self.updated_at == report.updated_at
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
