//! Lifecycle transitions: operational status, moderation decisions and
//! archiving. All of them are staff-only.

use std::sync::Arc;

use civic_common::{AppError, AppResult};
use civic_db::entities::{
    report::{self, ReportStatus},
    report_archive, user,
};

use super::{
    gate::{require_admin, ModerationGate},
    map_cache::MapFeedCache,
    notification::{ModerationDecision, NotificationService},
};
use crate::store::{ReportStoreRef, Stores};

/// Longest moderation note accepted.
pub const MAX_NOTES_CHARS: usize = 2000;

/// Message returned when moderation is requested on a deployment without it.
pub const MODERATION_UNAVAILABLE: &str =
    "Moderation is not enabled; run the pending moderation migration";

/// Lifecycle service for business logic.
#[derive(Clone)]
pub struct LifecycleService {
    reports: ReportStoreRef,
    notifications: NotificationService,
    gate: ModerationGate,
    map_cache: MapFeedCache,
}

impl LifecycleService {
    /// Create a new lifecycle service.
    #[must_use]
    pub fn new(stores: &Stores, gate: ModerationGate, map_cache: MapFeedCache) -> Self {
        Self {
            reports: Arc::clone(&stores.reports),
            notifications: NotificationService::new(Arc::clone(&stores.notifications)),
            gate,
            map_cache,
        }
    }

    /// Set the operational status. Setting the current value again succeeds.
    pub async fn set_status(
        &self,
        actor: &user::Model,
        id: &str,
        status: &str,
    ) -> AppResult<report::Model> {
        require_admin(actor)?;
        let status = ReportStatus::parse(status)
            .ok_or_else(|| AppError::Validation(format!("Invalid status: {}", status.trim())))?;

        let updated = self
            .reports
            .set_status(id, status)
            .await?
            .ok_or_else(|| AppError::ReportNotFound(id.to_string()))?;

        self.map_cache.invalidate();
        tracing::info!(report_id = %id, status = status.as_str(), actor = %actor.id, "Report status changed");
        Ok(updated)
    }

    /// Approve or deny a report and tell its author.
    ///
    /// Checks run in order: admin, input, capability, existence.
    pub async fn moderate(
        &self,
        actor: &user::Model,
        id: &str,
        decision: &str,
        notes: Option<&str>,
    ) -> AppResult<report::Model> {
        require_admin(actor)?;

        let Some(decision) = ModerationDecision::parse(decision).filter(|_| !id.trim().is_empty())
        else {
            return Err(AppError::Validation(
                "Invalid report id or decision".to_string(),
            ));
        };
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_CHARS) {
            return Err(AppError::Validation(format!(
                "Notes must be at most {MAX_NOTES_CHARS} characters"
            )));
        }

        if !self.gate.moderation_enabled() {
            return Err(AppError::FeatureUnavailable(MODERATION_UNAVAILABLE.to_string()));
        }

        let updated = self
            .reports
            .record_moderation(id, decision.status(), notes.map(ToString::to_string), &actor.id)
            .await?
            .ok_or_else(|| AppError::ReportNotFound(id.to_string()))?;

        self.map_cache.invalidate();
        tracing::info!(
            report_id = %id,
            decision = updated.moderation_status.as_str(),
            actor = %actor.id,
            "Report moderated"
        );

        self.notifications
            .moderation_decided(&updated, decision, notes)
            .await;
        Ok(updated)
    }

    /// Move a report into the archive. Either both the copy and the delete
    /// happen or neither does.
    pub async fn archive(
        &self,
        actor: &user::Model,
        id: &str,
    ) -> AppResult<report_archive::Model> {
        require_admin(actor)?;

        let archived = self
            .reports
            .archive(id, Some(actor.id.clone()))
            .await?
            .ok_or_else(|| AppError::ReportNotFound(id.to_string()))?;

        self.map_cache.invalidate();
        tracing::info!(report_id = %id, actor = %actor.id, "Report archived");
        Ok(archived)
    }
}
