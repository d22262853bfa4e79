//! Report entity.
//!
//! A report carries two independent lifecycles: `status` is the operational
//! triage state owned by staff, `moderation_status` controls public
//! visibility.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Operational status.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[sea_orm(string_value = "unresolved")]
    #[default]
    Unresolved,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "solved")]
    Solved,
}

impl ReportStatus {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::InProgress => "in_progress",
            Self::Solved => "solved",
        }
    }

    /// Parse a wire value. Surrounding whitespace and case are ignored.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unresolved" => Some(Self::Unresolved),
            "in_progress" => Some(Self::InProgress),
            "solved" => Some(Self::Solved),
            _ => None,
        }
    }
}

/// Moderation status.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "denied")]
    Denied,
}

impl ModerationStatus {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }

    /// Parse a wire value. Surrounding whitespace and case are ignored.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "denied" => Some(Self::Denied),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "report")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Submitting user; NULL for anonymous submissions
    #[sea_orm(nullable)]
    pub user_id: Option<String>,

    pub title: String,

    /// Category slug, e.g. `public_safety`
    pub category: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Free-form address text
    pub location: String,

    #[sea_orm(column_type = "Double", nullable)]
    pub latitude: Option<f64>,

    #[sea_orm(column_type = "Double", nullable)]
    pub longitude: Option<f64>,

    /// Relative path below the web root, e.g. `uploads/reports/<id>.jpg`
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
}

impl Model {
    /// Both coordinates, when present.
    #[must_use]
    pub const fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// Whether `user_id` submitted this report.
    #[must_use]
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
