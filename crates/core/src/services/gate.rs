//! Moderation gate.
//!
//! Decides, for every read path, which report rows a caller may see. The
//! moderation capability is fixed when the gate is built and never
//! re-checked per request.

use civic_common::{AppError, AppResult};
use civic_db::{
    entities::{
        report::{self, ModerationStatus, ReportStatus},
        user,
    },
    repositories::{BoundingBox, ReportQuery},
};
use serde::Serialize;

/// Who is looking at a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Anonymous visitor or a resident who did not submit the report.
    Public,
    /// The resident who submitted the report.
    Owner,
    /// Staff.
    Admin,
}

impl Audience {
    /// Classify `viewer` relative to `report`. Admin wins over ownership.
    #[must_use]
    pub fn of(viewer: Option<&user::Model>, report: &report::Model) -> Self {
        match viewer {
            Some(u) if u.is_admin() => Self::Admin,
            Some(u) if report.is_owned_by(&u.id) => Self::Owner,
            _ => Self::Public,
        }
    }
}

/// Raw list filters as they arrive from the query string.
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    /// `unresolved`, `in_progress`, `solved`; empty or `all` for no filter.
    pub status: Option<String>,
    /// Category slug; empty or `all` for no filter.
    pub category: Option<String>,
    /// Only the caller's own reports.
    pub mine: bool,
    /// Admin-only moderation filter: `pending`, `approved`, `denied`, `all`.
    pub moderation: Option<String>,
}

/// Capability flags computed once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Moderation workflow is configured on and the schema supports it.
    pub moderation_enabled: bool,
}

impl Capabilities {
    /// Combine the configuration flag with the schema check.
    #[must_use]
    pub const fn detect(configured: bool, schema_ready: bool) -> Self {
        Self {
            moderation_enabled: configured && schema_ready,
        }
    }
}

/// Row-level visibility rules.
#[derive(Debug, Clone, Copy)]
pub struct ModerationGate {
    capabilities: Capabilities,
    list_limit: u64,
    map_limit: u64,
}

impl ModerationGate {
    /// Create a gate.
    #[must_use]
    pub const fn new(capabilities: Capabilities, list_limit: u64, map_limit: u64) -> Self {
        Self {
            capabilities,
            list_limit,
            map_limit,
        }
    }

    /// Whether moderation rules apply at all.
    #[must_use]
    pub const fn moderation_enabled(&self) -> bool {
        self.capabilities.moderation_enabled
    }

    /// Startup capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Moderation state a public reader is restricted to.
    #[must_use]
    pub const fn public_scope(&self) -> Option<ModerationStatus> {
        if self.capabilities.moderation_enabled {
            Some(ModerationStatus::Approved)
        } else {
            None
        }
    }

    /// Moderation state assigned to a freshly submitted report.
    #[must_use]
    pub const fn initial_moderation(&self) -> ModerationStatus {
        if self.capabilities.moderation_enabled {
            ModerationStatus::Pending
        } else {
            ModerationStatus::Approved
        }
    }

    /// Build the list query for `viewer`.
    pub fn list_query(
        &self,
        viewer: Option<&user::Model>,
        filters: &ListFilters,
    ) -> AppResult<ReportQuery> {
        let status = parse_status_filter(filters.status.as_deref())?;
        let category = filters
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
            .map(ToString::to_string);

        let user_id = if filters.mine {
            Some(viewer.ok_or(AppError::Unauthorized)?.id.clone())
        } else {
            None
        };

        let moderation = if !self.capabilities.moderation_enabled {
            None
        } else if viewer.is_some_and(user::Model::is_admin) {
            parse_moderation_filter(filters.moderation.as_deref())?
        } else if filters.mine {
            // Owners track their own pending and denied submissions
            None
        } else {
            Some(ModerationStatus::Approved)
        };

        Ok(ReportQuery {
            status,
            category,
            user_id,
            moderation,
            bounds: None,
            with_coordinates: false,
            limit: self.list_limit,
        })
    }

    /// Build the map feed query. The map is a public surface for every caller.
    #[must_use]
    pub fn map_query(&self, bounds: BoundingBox) -> ReportQuery {
        ReportQuery {
            status: None,
            category: None,
            user_id: None,
            moderation: self.public_scope(),
            bounds: Some(bounds.normalized()),
            with_coordinates: true,
            limit: self.map_limit,
        }
    }

    /// Query for the admin moderation queue; `None` when moderation is off.
    #[must_use]
    pub fn queue_query(&self) -> Option<ReportQuery> {
        self.capabilities.moderation_enabled.then(|| ReportQuery {
            moderation: Some(ModerationStatus::Pending),
            limit: self.list_limit,
            ..Default::default()
        })
    }

    /// Whether `viewer` may read this single report.
    #[must_use]
    pub fn can_view(&self, viewer: Option<&user::Model>, report: &report::Model) -> bool {
        match Audience::of(viewer, report) {
            Audience::Admin | Audience::Owner => true,
            Audience::Public => self
                .public_scope()
                .is_none_or(|scope| report.moderation_status == scope),
        }
    }
}

/// Fail with `Forbidden` unless `user` is staff.
pub fn require_admin(user: &user::Model) -> AppResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".to_string()))
    }
}

fn parse_status_filter(raw: Option<&str>) -> AppResult<Option<ReportStatus>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => ReportStatus::parse(s)
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("Invalid status filter: {s}"))),
    }
}

fn parse_moderation_filter(raw: Option<&str>) -> AppResult<Option<ModerationStatus>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => ModerationStatus::parse(s)
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("Invalid moderation filter: {s}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{admin, report, resident};

    const ON: Capabilities = Capabilities {
        moderation_enabled: true,
    };
    const OFF: Capabilities = Capabilities {
        moderation_enabled: false,
    };

    fn gate(caps: Capabilities) -> ModerationGate {
        ModerationGate::new(caps, 200, 300)
    }

    #[test]
    fn test_capability_requires_both_flags() {
        assert!(Capabilities::detect(true, true).moderation_enabled);
        assert!(!Capabilities::detect(true, false).moderation_enabled);
        assert!(!Capabilities::detect(false, true).moderation_enabled);
    }

    #[test]
    fn test_public_sees_only_approved_when_enabled() {
        let q = gate(ON).list_query(None, &ListFilters::default()).unwrap();
        assert_eq!(q.moderation, Some(ModerationStatus::Approved));
        assert_eq!(q.limit, 200);

        let bob = resident("bob");
        let q = gate(ON).list_query(Some(&bob), &ListFilters::default()).unwrap();
        assert_eq!(q.moderation, Some(ModerationStatus::Approved));
    }

    #[test]
    fn test_no_moderation_filter_when_disabled() {
        let q = gate(OFF).list_query(None, &ListFilters::default()).unwrap();
        assert_eq!(q.moderation, None);

        let boss = admin("boss");
        let filters = ListFilters {
            moderation: Some("pending".into()),
            ..Default::default()
        };
        let q = gate(OFF).list_query(Some(&boss), &filters).unwrap();
        assert_eq!(q.moderation, None);
    }

    #[test]
    fn test_owner_mine_sees_every_moderation_state() {
        let alice = resident("alice");
        let filters = ListFilters {
            mine: true,
            ..Default::default()
        };
        let q = gate(ON).list_query(Some(&alice), &filters).unwrap();
        assert_eq!(q.user_id.as_deref(), Some("alice"));
        assert_eq!(q.moderation, None);
    }

    #[test]
    fn test_mine_requires_authentication() {
        let filters = ListFilters {
            mine: true,
            ..Default::default()
        };
        assert!(matches!(
            gate(ON).list_query(None, &filters),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_admin_moderation_filter() {
        let boss = admin("boss");
        let q = gate(ON).list_query(Some(&boss), &ListFilters::default()).unwrap();
        assert_eq!(q.moderation, None);

        let filters = ListFilters {
            moderation: Some("pending".into()),
            ..Default::default()
        };
        let q = gate(ON).list_query(Some(&boss), &filters).unwrap();
        assert_eq!(q.moderation, Some(ModerationStatus::Pending));

        let filters = ListFilters {
            moderation: Some("maybe".into()),
            ..Default::default()
        };
        assert!(matches!(
            gate(ON).list_query(Some(&boss), &filters),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_non_admin_moderation_param_ignored() {
        let bob = resident("bob");
        let filters = ListFilters {
            moderation: Some("denied".into()),
            ..Default::default()
        };
        let q = gate(ON).list_query(Some(&bob), &filters).unwrap();
        assert_eq!(q.moderation, Some(ModerationStatus::Approved));
    }

    #[test]
    fn test_status_and_category_filters() {
        let filters = ListFilters {
            status: Some("in_progress".into()),
            category: Some("all".into()),
            ..Default::default()
        };
        let q = gate(ON).list_query(None, &filters).unwrap();
        assert_eq!(q.status, Some(ReportStatus::InProgress));
        assert_eq!(q.category, None);

        let filters = ListFilters {
            status: Some("closed".into()),
            ..Default::default()
        };
        assert!(matches!(
            gate(ON).list_query(None, &filters),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_map_query_public_scope_and_limit() {
        let q = gate(ON).map_query(BoundingBox::default());
        assert!(q.with_coordinates);
        assert_eq!(q.moderation, Some(ModerationStatus::Approved));
        assert_eq!(q.limit, 300);

        let q = gate(OFF).map_query(BoundingBox::default());
        assert_eq!(q.moderation, None);
    }

    #[test]
    fn test_can_view_single_report() {
        let alice = resident("alice");
        let bob = resident("bob");
        let boss = admin("boss");
        let pending = report("r1", Some("alice"), ModerationStatus::Pending);

        assert!(gate(ON).can_view(Some(&alice), &pending));
        assert!(gate(ON).can_view(Some(&boss), &pending));
        assert!(!gate(ON).can_view(Some(&bob), &pending));
        assert!(!gate(ON).can_view(None, &pending));
        assert!(gate(OFF).can_view(None, &pending));
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&admin("boss")).is_ok());
        assert!(matches!(
            require_admin(&resident("bob")),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_queue_query() {
        assert!(gate(OFF).queue_query().is_none());
        let q = gate(ON).queue_query().unwrap();
        assert_eq!(q.moderation, Some(ModerationStatus::Pending));
    }
}
