//! In-memory stores.
//!
//! Process-local implementations of the store traits. They back tests and
//! deployments that explicitly select `notifications.backend = "memory"`;
//! nothing falls back to them on its own.

use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use civic_common::{AppError, AppResult};
use civic_db::{
    entities::{
        notification,
        report::{self, ModerationStatus, ReportStatus},
        report_archive, user,
    },
    repositories::{ReportQuery, StatusCounts},
};
use tokio::sync::RwLock;

use crate::store::{NotificationStore, ReportStore, UserStore};

fn newest_first(a: &report::Model, b: &report::Model) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Reports and their archive, guarded together.
#[derive(Default)]
struct ReportTables {
    live: HashMap<String, report::Model>,
    archive: HashMap<String, report_archive::Model>,
}

/// In-memory [`ReportStore`].
#[derive(Default)]
pub struct MemoryReportStore {
    tables: RwLock<ReportTables>,
    #[cfg(test)]
    fail_archive_writes: AtomicBool,
}

impl MemoryReportStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make archive writes fail, as a full disk or a lost connection would.
    #[cfg(test)]
    pub(crate) fn fail_archive_writes(&self, fail: bool) {
        self.fail_archive_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn insert(&self, report: report::Model) -> AppResult<report::Model> {
        let mut tables = self.tables.write().await;
        if tables.live.contains_key(&report.id) {
            return Err(AppError::Database(format!(
                "duplicate report id {}",
                report.id
            )));
        }
        tables.live.insert(report.id.clone(), report.clone());
        Ok(report)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>> {
        Ok(self.tables.read().await.live.get(id).cloned())
    }

    async fn list(&self, query: &ReportQuery) -> AppResult<Vec<report::Model>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<report::Model> = tables
            .live
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        rows.sort_by(newest_first);
        rows.truncate(usize::try_from(query.limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn set_status(
        &self,
        id: &str,
        status: ReportStatus,
    ) -> AppResult<Option<report::Model>> {
        let mut tables = self.tables.write().await;
        Ok(tables.live.get_mut(id).map(|r| {
            r.status = status;
            r.updated_at = Utc::now().into();
            r.clone()
        }))
    }

    async fn record_moderation(
        &self,
        id: &str,
        decision: ModerationStatus,
        notes: Option<String>,
        moderated_by: &str,
    ) -> AppResult<Option<report::Model>> {
        let mut tables = self.tables.write().await;
        let now = Utc::now().into();
        Ok(tables.live.get_mut(id).map(|r| {
            r.moderation_status = decision;
            r.moderation_notes = notes;
            r.moderated_by = Some(moderated_by.to_string());
            r.moderated_at = Some(now);
            r.updated_at = now;
            r.clone()
        }))
    }

    async fn archive(
        &self,
        id: &str,
        archived_by: Option<String>,
    ) -> AppResult<Option<report_archive::Model>> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.live.get(id).cloned() else {
            return Ok(None);
        };

        #[cfg(test)]
        if self.fail_archive_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("archive copy failed".to_string()));
        }
        if tables.archive.contains_key(id) {
            return Err(AppError::Database(format!("report {id} already archived")));
        }

        let archived = report_archive::Model::from_report(existing, archived_by, Utc::now().into());
        tables.archive.insert(id.to_string(), archived.clone());
        tables.live.remove(id);
        Ok(Some(archived))
    }

    async fn find_archived(&self, id: &str) -> AppResult<Option<report_archive::Model>> {
        Ok(self.tables.read().await.archive.get(id).cloned())
    }

    async fn count_by_status(
        &self,
        moderation: Option<ModerationStatus>,
    ) -> AppResult<StatusCounts> {
        let tables = self.tables.read().await;
        let mut counts = StatusCounts::default();
        tables
            .live
            .values()
            .filter(|r| moderation.is_none_or(|m| r.moderation_status == m))
            .for_each(|r| counts.add(r.status));
        Ok(counts)
    }

    async fn count_by_moderation(&self, moderation: ModerationStatus) -> AppResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .live
            .values()
            .filter(|r| r.moderation_status == moderation)
            .count() as u64)
    }
}

/// In-memory [`UserStore`].
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, user::Model>>,
}

impl MemoryUserStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: user::Model) -> AppResult<user::Model> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        let email = email.trim().to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.token.as_deref() == Some(token))
            .cloned())
    }

    async fn update_token(&self, id: &str, token: Option<String>) -> AppResult<user::Model> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))?;
        user.token = token;
        user.updated_at = Utc::now().into();
        Ok(user.clone())
    }
}

/// In-memory [`NotificationStore`], keyed by user ID.
#[derive(Default)]
pub struct MemoryNotificationStore {
    inboxes: RwLock<HashMap<String, Vec<notification::Model>>>,
}

impl MemoryNotificationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, notification: notification::Model) -> AppResult<notification::Model> {
        self.inboxes
            .write()
            .await
            .entry(notification.user_id.clone())
            .or_default()
            .push(notification.clone());
        Ok(notification)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        let inboxes = self.inboxes.read().await;
        let mut items: Vec<notification::Model> = inboxes
            .get(user_id)
            .map(|inbox| {
                inbox
                    .iter()
                    .filter(|n| !unread_only || !n.is_read)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(items)
    }

    async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        let inboxes = self.inboxes.read().await;
        Ok(inboxes
            .get(user_id)
            .map_or(0, |inbox| inbox.iter().filter(|n| !n.is_read).count() as u64))
    }

    async fn mark_read(&self, user_id: &str, id: &str) -> AppResult<bool> {
        let mut inboxes = self.inboxes.write().await;
        let Some(n) = inboxes
            .get_mut(user_id)
            .and_then(|inbox| inbox.iter_mut().find(|n| n.id == id && !n.is_read))
        else {
            return Ok(false);
        };
        n.is_read = true;
        n.updated_at = Utc::now().into();
        Ok(true)
    }

    async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        let mut inboxes = self.inboxes.write().await;
        let now = Utc::now().into();
        let mut changed = 0;
        if let Some(inbox) = inboxes.get_mut(user_id) {
            for n in inbox.iter_mut().filter(|n| !n.is_read) {
                n.is_read = true;
                n.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn clear(&self, user_id: &str) -> AppResult<u64> {
        Ok(self
            .inboxes
            .write()
            .await
            .remove(user_id)
            .map_or(0, |inbox| inbox.len() as u64))
    }
}
