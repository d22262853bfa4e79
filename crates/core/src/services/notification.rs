//! Notification service.
//!
//! Emission is best effort: a failed insert is logged and never fails the
//! report operation that triggered it.

use chrono::Utc;
use civic_common::{AppResult, IdGenerator};
use civic_db::entities::{
    notification::{self, NotificationType},
    report,
};
use serde::Serialize;

use crate::store::NotificationStoreRef;

/// Largest inbox page a caller may request.
pub const MAX_INBOX_LIMIT: u64 = 100;

/// Moderation outcome as reported to the resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationDecision {
    Approve,
    Deny,
}

impl ModerationDecision {
    /// Parse `approve` / `deny`, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" => Some(Self::Approve),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }

    /// Resulting moderation status.
    #[must_use]
    pub const fn status(self) -> report::ModerationStatus {
        match self {
            Self::Approve => report::ModerationStatus::Approved,
            Self::Deny => report::ModerationStatus::Denied,
        }
    }
}

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    store: NotificationStoreRef,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(store: NotificationStoreRef) -> Self {
        Self {
            store,
            id_gen: IdGenerator::new(),
        }
    }

    /// Insert a notification for `user_id`.
    pub async fn notify(
        &self,
        user_id: &str,
        title: &str,
        meta: &str,
        notification_type: NotificationType,
    ) -> AppResult<notification::Model> {
        let now = Utc::now().into();
        let model = notification::Model {
            id: self.id_gen.generate(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            meta: meta.to_string(),
            notification_type,
            is_read: false,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(model).await
    }

    /// Like [`Self::notify`] but swallows failures.
    pub async fn emit(
        &self,
        user_id: &str,
        title: &str,
        meta: &str,
        notification_type: NotificationType,
    ) -> Option<notification::Model> {
        match self.notify(user_id, title, meta, notification_type).await {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to emit notification");
                None
            }
        }
    }

    /// Tell the author their report was received. Anonymous reports are skipped.
    pub async fn report_submitted(
        &self,
        report: &report::Model,
        moderation_enabled: bool,
    ) -> Option<notification::Model> {
        let user_id = report.user_id.as_deref()?;
        let suffix = if moderation_enabled {
            "awaiting review"
        } else {
            "now live"
        };
        let meta = format!("{} · {suffix}", report.title);
        self.emit(user_id, "Report submitted", &meta, NotificationType::Success)
            .await
    }

    /// Tell the author about a moderation decision.
    pub async fn moderation_decided(
        &self,
        report: &report::Model,
        decision: ModerationDecision,
        notes: Option<&str>,
    ) -> Option<notification::Model> {
        let user_id = report.user_id.as_deref()?;
        let (title, mut meta, kind) = match decision {
            ModerationDecision::Approve => (
                "Report approved",
                format!("{} is now live", report.title),
                NotificationType::Success,
            ),
            ModerationDecision::Deny => (
                "Report denied",
                format!("{} was not approved", report.title),
                NotificationType::Warning,
            ),
        };
        if let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) {
            meta.push_str(" · ");
            meta.push_str(notes);
        }
        self.emit(user_id, title, &meta, kind).await
    }

    /// Newest-first inbox page.
    pub async fn list(
        &self,
        user_id: &str,
        limit: Option<u64>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        let limit = limit.unwrap_or(20).clamp(1, MAX_INBOX_LIMIT);
        self.store.list_for_user(user_id, limit, unread_only).await
    }

    /// Unread count.
    pub async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        self.store.count_unread(user_id).await
    }

    /// Mark one notification read; `false` if it was not found or already read.
    pub async fn mark_read(&self, user_id: &str, id: &str) -> AppResult<bool> {
        self.store.mark_read(user_id, id).await
    }

    /// Mark the whole inbox read.
    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        self.store.mark_all_read(user_id).await
    }

    /// Empty the inbox.
    pub async fn clear(&self, user_id: &str) -> AppResult<u64> {
        self.store.clear(user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use civic_common::AppError;
    use civic_db::entities::report::ModerationStatus;

    use super::*;
    use crate::{memory::MemoryNotificationStore, store::NotificationStore, test_support::report};

    fn service() -> (NotificationService, Arc<MemoryNotificationStore>) {
        let store = Arc::new(MemoryNotificationStore::new());
        (NotificationService::new(store.clone()), store)
    }

    struct BrokenStore;

    #[async_trait]
    impl NotificationStore for BrokenStore {
        async fn insert(&self, _: notification::Model) -> AppResult<notification::Model> {
            Err(AppError::Database("connection reset".into()))
        }
        async fn list_for_user(&self, _: &str, _: u64, _: bool) -> AppResult<Vec<notification::Model>> {
            Ok(vec![])
        }
        async fn count_unread(&self, _: &str) -> AppResult<u64> {
            Ok(0)
        }
        async fn mark_read(&self, _: &str, _: &str) -> AppResult<bool> {
            Ok(false)
        }
        async fn mark_all_read(&self, _: &str) -> AppResult<u64> {
            Ok(0)
        }
        async fn clear(&self, _: &str) -> AppResult<u64> {
            Ok(0)
        }
    }

    #[test]
    fn test_decision_parse() {
        assert_eq!(ModerationDecision::parse(" Approve "), Some(ModerationDecision::Approve));
        assert_eq!(ModerationDecision::parse("DENY"), Some(ModerationDecision::Deny));
        assert_eq!(ModerationDecision::parse("approved"), None);
        assert_eq!(ModerationDecision::Deny.status(), ModerationStatus::Denied);
    }

    #[tokio::test]
    async fn test_report_submitted_meta() {
        let (svc, _) = service();
        let r = report("r1", Some("alice"), ModerationStatus::Pending);

        let n = svc.report_submitted(&r, true).await.unwrap();
        assert_eq!(n.title, "Report submitted");
        assert_eq!(n.meta, "Report r1 · awaiting review");
        assert_eq!(n.notification_type, NotificationType::Success);

        let n = svc.report_submitted(&r, false).await.unwrap();
        assert_eq!(n.meta, "Report r1 · now live");
    }

    #[tokio::test]
    async fn test_anonymous_report_not_notified() {
        let (svc, store) = service();
        let r = report("r1", None, ModerationStatus::Pending);
        assert!(svc.report_submitted(&r, true).await.is_none());
        assert_eq!(store.count_unread("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_moderation_messages() {
        let (svc, _) = service();
        let r = report("r1", Some("alice"), ModerationStatus::Pending);

        let n = svc
            .moderation_decided(&r, ModerationDecision::Approve, None)
            .await
            .unwrap();
        assert_eq!(n.title, "Report approved");
        assert_eq!(n.meta, "Report r1 is now live");

        let n = svc
            .moderation_decided(&r, ModerationDecision::Deny, Some(" Duplicate "))
            .await
            .unwrap();
        assert_eq!(n.title, "Report denied");
        assert_eq!(n.meta, "Report r1 was not approved · Duplicate");
        assert_eq!(n.notification_type, NotificationType::Warning);

        let n = svc
            .moderation_decided(&r, ModerationDecision::Deny, Some("  "))
            .await
            .unwrap();
        assert_eq!(n.meta, "Report r1 was not approved");
    }

    #[tokio::test]
    async fn test_emit_swallows_store_errors() {
        let svc = NotificationService::new(Arc::new(BrokenStore));
        let r = report("r1", Some("alice"), ModerationStatus::Pending);
        assert!(svc.report_submitted(&r, true).await.is_none());
        assert!(svc.notify("alice", "t", "m", NotificationType::Info).await.is_err());
    }

    #[tokio::test]
    async fn test_inbox_operations() {
        let (svc, _) = service();
        for i in 0..3 {
            svc.notify("alice", &format!("n{i}"), "", NotificationType::Info)
                .await
                .unwrap();
        }
        svc.notify("bob", "other", "", NotificationType::Info).await.unwrap();

        let inbox = svc.list("alice", None, false).await.unwrap();
        assert_eq!(inbox.len(), 3);
        assert_eq!(svc.unread_count("alice").await.unwrap(), 3);

        // Another user's id cannot be marked through alice's inbox
        let bobs = svc.list("bob", None, false).await.unwrap();
        assert!(!svc.mark_read("alice", &bobs[0].id).await.unwrap());

        assert!(svc.mark_read("alice", &inbox[0].id).await.unwrap());
        assert!(!svc.mark_read("alice", &inbox[0].id).await.unwrap());
        assert_eq!(svc.list("alice", Some(500), true).await.unwrap().len(), 2);

        assert_eq!(svc.mark_all_read("alice").await.unwrap(), 2);
        assert_eq!(svc.unread_count("alice").await.unwrap(), 0);

        assert_eq!(svc.clear("alice").await.unwrap(), 3);
        assert!(svc.list("alice", None, false).await.unwrap().is_empty());
        assert_eq!(svc.unread_count("bob").await.unwrap(), 1);
    }
}
