//! Persistence seams.
//!
//! Services talk to these traits instead of the repositories directly so
//! the same logic runs against the database or an explicit in-memory store
//! (see [`crate::memory`]).

use std::sync::Arc;

use async_trait::async_trait;
use civic_common::AppResult;
use civic_db::{
    entities::{
        notification,
        report::{self, ModerationStatus, ReportStatus},
        report_archive, user,
    },
    repositories::{
        NotificationRepository, ReportQuery, ReportRepository, StatusCounts, UserRepository,
    },
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, IntoActiveModel};

use crate::memory::{MemoryNotificationStore, MemoryReportStore, MemoryUserStore};

/// Report persistence.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert a fully built report.
    async fn insert(&self, report: report::Model) -> AppResult<report::Model>;

    /// Find a live report.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>>;

    /// List live reports matching `query`, newest first, capped at `query.limit`.
    async fn list(&self, query: &ReportQuery) -> AppResult<Vec<report::Model>>;

    /// Set the operational status and bump `updated_at`.
    async fn set_status(
        &self,
        id: &str,
        status: ReportStatus,
    ) -> AppResult<Option<report::Model>>;

    /// Record a moderation decision with actor and timestamp.
    async fn record_moderation(
        &self,
        id: &str,
        decision: ModerationStatus,
        notes: Option<String>,
        moderated_by: &str,
    ) -> AppResult<Option<report::Model>>;

    /// Copy the report into the archive and delete it, all or nothing.
    async fn archive(
        &self,
        id: &str,
        archived_by: Option<String>,
    ) -> AppResult<Option<report_archive::Model>>;

    /// Find an archived report.
    async fn find_archived(&self, id: &str) -> AppResult<Option<report_archive::Model>>;

    /// Per-status counts, optionally within one moderation state.
    async fn count_by_status(
        &self,
        moderation: Option<ModerationStatus>,
    ) -> AppResult<StatusCounts>;

    /// Rows in one moderation state.
    async fn count_by_moderation(&self, moderation: ModerationStatus) -> AppResult<u64>;
}

/// User persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a fully built user.
    async fn insert(&self, user: user::Model) -> AppResult<user::Model>;

    /// Find a user by ID.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>>;

    /// Find several users at once.
    async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<user::Model>>;

    /// Find a user by email (case-insensitive).
    async fn find_by_email(&self, email: &str) -> AppResult<Option<user::Model>>;

    /// Find a user by bearer token.
    async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>>;

    /// Replace the session token.
    async fn update_token(&self, id: &str, token: Option<String>) -> AppResult<user::Model>;
}

/// Notification persistence.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert a notification.
    async fn insert(&self, notification: notification::Model) -> AppResult<notification::Model>;

    /// Newest-first notifications for a user.
    async fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>>;

    /// Unread count for a user.
    async fn count_unread(&self, user_id: &str) -> AppResult<u64>;

    /// Mark one of the user's notifications read. Returns whether it changed.
    async fn mark_read(&self, user_id: &str, id: &str) -> AppResult<bool>;

    /// Mark all of the user's notifications read.
    async fn mark_all_read(&self, user_id: &str) -> AppResult<u64>;

    /// Delete all of the user's notifications.
    async fn clear(&self, user_id: &str) -> AppResult<u64>;
}

/// Shared report store.
pub type ReportStoreRef = Arc<dyn ReportStore>;
/// Shared user store.
pub type UserStoreRef = Arc<dyn UserStore>;
/// Shared notification store.
pub type NotificationStoreRef = Arc<dyn NotificationStore>;

/// The three stores a running service needs.
#[derive(Clone)]
pub struct Stores {
    /// Live reports and their archive.
    pub reports: ReportStoreRef,
    /// Accounts.
    pub users: UserStoreRef,
    /// Resident inboxes.
    pub notifications: NotificationStoreRef,
}

impl Stores {
    /// Database-backed stores sharing one connection pool. Notifications go
    /// to memory only when `memory_notifications` is set.
    #[must_use]
    pub fn database(db: Arc<DatabaseConnection>, memory_notifications: bool) -> Self {
        let notifications: NotificationStoreRef = if memory_notifications {
            Arc::new(MemoryNotificationStore::new())
        } else {
            Arc::new(NotificationRepository::new(Arc::clone(&db)))
        };
        Self {
            reports: Arc::new(ReportRepository::new(Arc::clone(&db))),
            users: Arc::new(UserRepository::new(db)),
            notifications,
        }
    }

    /// Fully in-memory stores.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            reports: Arc::new(MemoryReportStore::new()),
            users: Arc::new(MemoryUserStore::new()),
            notifications: Arc::new(MemoryNotificationStore::new()),
        }
    }
}

#[async_trait]
impl ReportStore for ReportRepository {
    async fn insert(&self, report: report::Model) -> AppResult<report::Model> {
        self.create(report.into_active_model().reset_all()).await
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>> {
        Self::find_by_id(self, id).await
    }

    async fn list(&self, query: &ReportQuery) -> AppResult<Vec<report::Model>> {
        Self::list(self, query).await
    }

    async fn set_status(
        &self,
        id: &str,
        status: ReportStatus,
    ) -> AppResult<Option<report::Model>> {
        self.update_status(id, status).await
    }

    async fn record_moderation(
        &self,
        id: &str,
        decision: ModerationStatus,
        notes: Option<String>,
        moderated_by: &str,
    ) -> AppResult<Option<report::Model>> {
        Self::record_moderation(self, id, decision, notes, moderated_by).await
    }

    async fn archive(
        &self,
        id: &str,
        archived_by: Option<String>,
    ) -> AppResult<Option<report_archive::Model>> {
        Self::archive(self, id, archived_by).await
    }

    async fn find_archived(&self, id: &str) -> AppResult<Option<report_archive::Model>> {
        Self::find_archived(self, id).await
    }

    async fn count_by_status(
        &self,
        moderation: Option<ModerationStatus>,
    ) -> AppResult<StatusCounts> {
        Self::count_by_status(self, moderation).await
    }

    async fn count_by_moderation(&self, moderation: ModerationStatus) -> AppResult<u64> {
        Self::count_by_moderation(self, moderation).await
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn insert(&self, user: user::Model) -> AppResult<user::Model> {
        self.create(user.into_active_model().reset_all()).await
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        Self::find_by_id(self, id).await
    }

    async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        Self::find_by_ids(self, ids).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        Self::find_by_email(self, email).await
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        Self::find_by_token(self, token).await
    }

    async fn update_token(&self, id: &str, token: Option<String>) -> AppResult<user::Model> {
        Self::update_token(self, id, token).await
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn insert(&self, notification: notification::Model) -> AppResult<notification::Model> {
        self.create(notification.into_active_model().reset_all()).await
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        self.find_by_user(user_id, limit, unread_only).await
    }

    async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        Self::count_unread(self, user_id).await
    }

    async fn mark_read(&self, user_id: &str, id: &str) -> AppResult<bool> {
        self.mark_as_read(user_id, id).await
    }

    async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        self.mark_all_as_read(user_id).await
    }

    async fn clear(&self, user_id: &str) -> AppResult<u64> {
        self.delete_all_for_user(user_id).await
    }
}
