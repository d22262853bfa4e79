//! Report repository.

use std::sync::Arc;

use crate::entities::{
    Report, ReportArchive,
    report::{self, ModerationStatus, ReportStatus},
    report_archive,
};
use chrono::Utc;
use civic_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
    prelude::DateTimeWithTimeZone,
};
use serde::Serialize;

/// Half-width of the window a zero-area bounding box axis is expanded to.
pub const POINT_EPSILON: f64 = 0.0008;

/// Axis extents smaller than this are treated as a single point.
const DEGENERATE_EXTENT: f64 = 1e-12;

/// Optional viewport bounds for the map feed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    /// Southern edge.
    pub min_lat: Option<f64>,
    /// Northern edge.
    pub max_lat: Option<f64>,
    /// Western edge.
    pub min_lng: Option<f64>,
    /// Eastern edge.
    pub max_lng: Option<f64>,
}

impl BoundingBox {
    /// Expand zero-area axes to `±POINT_EPSILON` around the point so a
    /// point lookup still runs as a range query.
    #[must_use]
    pub fn normalized(self) -> Self {
        let (min_lat, max_lat) = expand_axis(self.min_lat, self.max_lat);
        let (min_lng, max_lng) = expand_axis(self.min_lng, self.max_lng);
        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    /// Whether the point lies inside every present bound.
    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        self.min_lat.is_none_or(|min| lat >= min)
            && self.max_lat.is_none_or(|max| lat <= max)
            && self.min_lng.is_none_or(|min| lng >= min)
            && self.max_lng.is_none_or(|max| lng <= max)
    }

    /// Whether no bound is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.min_lat.is_none()
            && self.max_lat.is_none()
            && self.min_lng.is_none()
            && self.max_lng.is_none()
    }

    /// Stable key: each bound at 6 decimals, `x` when absent.
    #[must_use]
    pub fn cache_key(&self) -> String {
        [self.min_lat, self.max_lat, self.min_lng, self.max_lng]
            .iter()
            .map(|b| b.map_or_else(|| "x".to_string(), |v| format!("{v:.6}")))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn expand_axis(min: Option<f64>, max: Option<f64>) -> (Option<f64>, Option<f64>) {
    match (min, max) {
        (Some(a), Some(b)) if (a - b).abs() < DEGENERATE_EXTENT => {
            (Some(a - POINT_EPSILON), Some(a + POINT_EPSILON))
        }
        other => other,
    }
}

/// Row filter for report listings.
///
/// Every read path builds one of these; the moderation gate decides
/// `moderation` before it reaches the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportQuery {
    /// Operational status filter.
    pub status: Option<ReportStatus>,
    /// Exact category slug.
    pub category: Option<String>,
    /// Only reports submitted by this user.
    pub user_id: Option<String>,
    /// Only reports in this moderation state.
    pub moderation: Option<ModerationStatus>,
    /// Viewport bounds; expected to be normalized already.
    pub bounds: Option<BoundingBox>,
    /// Only reports that carry both coordinates.
    pub with_coordinates: bool,
    /// Row cap.
    pub limit: u64,
}

impl Default for ReportQuery {
    fn default() -> Self {
        Self {
            status: None,
            category: None,
            user_id: None,
            moderation: None,
            bounds: None,
            with_coordinates: false,
            limit: 200,
        }
    }
}

impl ReportQuery {
    /// In-process evaluation of the same predicate the SQL query applies.
    #[must_use]
    pub fn matches(&self, report: &report::Model) -> bool {
        if self.status.is_some_and(|s| s != report.status) {
            return false;
        }
        if self
            .category
            .as_deref()
            .is_some_and(|c| c != report.category)
        {
            return false;
        }
        if self
            .user_id
            .as_deref()
            .is_some_and(|u| !report.is_owned_by(u))
        {
            return false;
        }
        if self
            .moderation
            .is_some_and(|m| m != report.moderation_status)
        {
            return false;
        }
        let coords = report.coordinates();
        if self.with_coordinates && coords.is_none() {
            return false;
        }
        if let Some(bounds) = self.bounds.filter(|b| !b.is_unbounded()) {
            match coords {
                Some((lat, lng)) if bounds.contains(lat, lng) => {}
                _ => return false,
            }
        }
        true
    }

    /// Cache key covering every field that changes the result set.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "s={};c={};u={};m={};b={};xy={};l={}",
            self.status.map_or("*", ReportStatus::as_str),
            self.category.as_deref().unwrap_or("*"),
            self.user_id.as_deref().unwrap_or("*"),
            self.moderation.map_or("*", ModerationStatus::as_str),
            self.bounds
                .map_or_else(|| "x,x,x,x".to_string(), |b| b.cache_key()),
            u8::from(self.with_coordinates),
            self.limit,
        )
    }

    fn apply(&self, mut query: Select<Report>) -> Select<Report> {
        if let Some(status) = self.status {
            query = query.filter(report::Column::Status.eq(status));
        }
        if let Some(category) = &self.category {
            query = query.filter(report::Column::Category.eq(category.as_str()));
        }
        if let Some(user_id) = &self.user_id {
            query = query.filter(report::Column::UserId.eq(user_id.as_str()));
        }
        if let Some(moderation) = self.moderation {
            query = query.filter(report::Column::ModerationStatus.eq(moderation));
        }
        if self.with_coordinates {
            query = query
                .filter(report::Column::Latitude.is_not_null())
                .filter(report::Column::Longitude.is_not_null());
        }
        if let Some(bounds) = self.bounds {
            if let Some(v) = bounds.min_lat {
                query = query.filter(report::Column::Latitude.gte(v));
            }
            if let Some(v) = bounds.max_lat {
                query = query.filter(report::Column::Latitude.lte(v));
            }
            if let Some(v) = bounds.min_lng {
                query = query.filter(report::Column::Longitude.gte(v));
            }
            if let Some(v) = bounds.max_lng {
                query = query.filter(report::Column::Longitude.lte(v));
            }
        }
        query
    }
}

/// Report counts per operational status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    /// `unresolved` rows.
    pub unresolved: u64,
    /// `in_progress` rows.
    pub in_progress: u64,
    /// `solved` rows.
    pub solved: u64,
}

impl StatusCounts {
    /// Sum over all statuses.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.unresolved + self.in_progress + self.solved
    }

    /// Add one row of `status`.
    pub const fn add(&mut self, status: ReportStatus) {
        match status {
            ReportStatus::Unresolved => self.unresolved += 1,
            ReportStatus::InProgress => self.in_progress += 1,
            ReportStatus::Solved => self.solved += 1,
        }
    }
}

/// Report repository for database operations.
#[derive(Clone)]
pub struct ReportRepository {
    db: Arc<DatabaseConnection>,
}

impl ReportRepository {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a report by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>> {
        Report::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new report.
    pub async fn create(&self, model: report::ActiveModel) -> AppResult<report::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List reports matching `query`, newest first.
    pub async fn list(&self, query: &ReportQuery) -> AppResult<Vec<report::Model>> {
        query
            .apply(Report::find())
            .order_by_desc(report::Column::CreatedAt)
            .order_by_desc(report::Column::Id)
            .limit(query.limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Set the operational status. Moderation fields are left alone.
    ///
    /// Returns `None` when the report does not exist.
    pub async fn update_status(
        &self,
        id: &str,
        status: ReportStatus,
    ) -> AppResult<Option<report::Model>> {
        let Some(existing) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let mut active: report::ActiveModel = existing.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now().into());
        active
            .update(self.db.as_ref())
            .await
            .map(Some)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a moderation decision. The operational status is left alone.
    ///
    /// Returns `None` when the report does not exist.
    pub async fn record_moderation(
        &self,
        id: &str,
        decision: ModerationStatus,
        notes: Option<String>,
        moderated_by: &str,
    ) -> AppResult<Option<report::Model>> {
        let Some(existing) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut active: report::ActiveModel = existing.into();
        active.moderation_status = Set(decision);
        active.moderation_notes = Set(notes);
        active.moderated_by = Set(Some(moderated_by.to_string()));
        active.moderated_at = Set(Some(now));
        active.updated_at = Set(now);
        active
            .update(self.db.as_ref())
            .await
            .map(Some)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Move a report into the archive.
    ///
    /// The copy and the delete run in one transaction; if either fails the
    /// transaction is dropped uncommitted and the live row stays.
    /// Returns `None` when the report does not exist.
    pub async fn archive(
        &self,
        id: &str,
        archived_by: Option<String>,
    ) -> AppResult<Option<report_archive::Model>> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let Some(existing) = Report::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let archived = report_archive::Model::from_report(existing, archived_by, Utc::now().into())
            .into_active_model()
            .reset_all()
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(format!("archive copy failed: {e}")))?;

        let deleted = Report::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if deleted.rows_affected != 1 {
            return Err(AppError::Database(format!(
                "archive delete removed {} rows",
                deleted.rows_affected
            )));
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Some(archived))
    }

    /// Find an archived report by its original ID.
    pub async fn find_archived(&self, id: &str) -> AppResult<Option<report_archive::Model>> {
        ReportArchive::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count reports per status, optionally restricted to one moderation state.
    pub async fn count_by_status(
        &self,
        moderation: Option<ModerationStatus>,
    ) -> AppResult<StatusCounts> {
        let mut counts = StatusCounts::default();
        for status in [
            ReportStatus::Unresolved,
            ReportStatus::InProgress,
            ReportStatus::Solved,
        ] {
            let mut query = Report::find().filter(report::Column::Status.eq(status));
            if let Some(m) = moderation {
                query = query.filter(report::Column::ModerationStatus.eq(m));
            }
            let n = query
                .count(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            match status {
                ReportStatus::Unresolved => counts.unresolved = n,
                ReportStatus::InProgress => counts.in_progress = n,
                ReportStatus::Solved => counts.solved = n,
            }
        }
        Ok(counts)
    }

    /// Count reports in one moderation state.
    pub async fn count_by_moderation(&self, moderation: ModerationStatus) -> AppResult<u64> {
        Report::find()
            .filter(report::Column::ModerationStatus.eq(moderation))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Transaction};

    fn create_test_report(id: &str) -> report::Model {
        let now = Utc::now().into();
        report::Model {
            id: id.to_string(),
            user_id: Some("user1".to_string()),
            title: "Broken streetlight".to_string(),
            category: "public_safety".to_string(),
            description: "Dark since Monday".to_string(),
            location: "Rizal Ave, Poblacion".to_string(),
            latitude: Some(14.5995),
            longitude: Some(120.9842),
            image_path: None,
            status: ReportStatus::Unresolved,
            moderation_status: ModerationStatus::Pending,
            moderation_notes: None,
            moderated_by: None,
            moderated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(n)) }
    }

    #[test]
    fn test_degenerate_bbox_expands() {
        let bbox = BoundingBox {
            min_lat: Some(14.5),
            max_lat: Some(14.5),
            min_lng: Some(121.0),
            max_lng: Some(121.0),
        }
        .normalized();

        assert!((bbox.min_lat.unwrap() - (14.5 - POINT_EPSILON)).abs() < 1e-9);
        assert!((bbox.max_lat.unwrap() - (14.5 + POINT_EPSILON)).abs() < 1e-9);
        assert!((bbox.min_lng.unwrap() - (121.0 - POINT_EPSILON)).abs() < 1e-9);
        assert!((bbox.max_lng.unwrap() - (121.0 + POINT_EPSILON)).abs() < 1e-9);
        assert!(bbox.contains(14.5005, 121.0005));
        assert!(!bbox.contains(14.502, 121.0));
    }

    #[test]
    fn test_partial_bbox_untouched() {
        let bbox = BoundingBox {
            min_lat: Some(14.0),
            max_lat: None,
            min_lng: Some(120.0),
            max_lng: Some(121.0),
        };
        assert_eq!(bbox.normalized(), bbox);
        assert!(bbox.contains(80.0, 120.5));
        assert!(!bbox.contains(13.9, 120.5));
        assert_eq!(bbox.cache_key(), "14.000000,x,120.000000,121.000000");
    }

    #[test]
    fn test_query_matches() {
        let report = create_test_report("r1");

        assert!(ReportQuery::default().matches(&report));
        assert!(
            ReportQuery {
                moderation: Some(ModerationStatus::Pending),
                user_id: Some("user1".to_string()),
                ..Default::default()
            }
            .matches(&report)
        );
        assert!(
            !ReportQuery {
                moderation: Some(ModerationStatus::Approved),
                ..Default::default()
            }
            .matches(&report)
        );
        assert!(
            !ReportQuery {
                category: Some("cleanliness".to_string()),
                ..Default::default()
            }
            .matches(&report)
        );

        let mut no_coords = create_test_report("r2");
        no_coords.latitude = None;
        let map_query = ReportQuery {
            with_coordinates: true,
            ..Default::default()
        };
        assert!(map_query.matches(&report));
        assert!(!map_query.matches(&no_coords));
    }

    #[test]
    fn test_cache_key_distinguishes_queries() {
        let a = ReportQuery::default();
        let b = ReportQuery {
            moderation: Some(ModerationStatus::Approved),
            ..Default::default()
        };
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), ReportQuery::default().cache_key());
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let report = create_test_report("r1");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[report.clone()]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let found = repo.find_by_id("r1").await.unwrap();
        assert_eq!(found, Some(report));
    }

    #[tokio::test]
    async fn test_list_applies_filters() {
        let report = create_test_report("r1");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[report.clone()]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db.clone());
        let query = ReportQuery {
            status: Some(ReportStatus::Unresolved),
            moderation: Some(ModerationStatus::Approved),
            with_coordinates: true,
            limit: 300,
            ..Default::default()
        };
        let rows = repo.list(&query).await.unwrap();
        assert_eq!(rows.len(), 1);

        drop(repo);
        let db = Arc::try_unwrap(db).ok().unwrap();
        let log = db.into_transaction_log();
        let sql = format!("{log:?}");
        assert!(sql.contains("\\\"moderation_status\\\" = $"));
        assert!(sql.contains("\\\"latitude\\\" IS NOT NULL"));
        assert!(sql.contains("ORDER BY \\\"report\\\".\\\"created_at\\\" DESC"));
    }

    #[tokio::test]
    async fn test_update_status_missing_report() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<report::Model>::new()])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let result = repo
            .update_status("missing", ReportStatus::Solved)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_status_keeps_moderation() {
        let report = create_test_report("r1");
        let mut updated = report.clone();
        updated.status = ReportStatus::Solved;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[report.clone()], [updated.clone()]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let result = repo
            .update_status("r1", ReportStatus::Solved)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.status, ReportStatus::Solved);
        assert_eq!(result.moderation_status, ModerationStatus::Pending);
    }

    #[tokio::test]
    async fn test_archive_commits_copy_and_delete() {
        let report = create_test_report("r1");
        let archived =
            report_archive::Model::from_report(report.clone(), Some("admin1".into()), Utc::now().into());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[report.clone()]])
                .append_query_results([[archived.clone()]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = ReportRepository::new(db.clone());
        let result = repo
            .archive("r1", Some("admin1".into()))
            .await
            .unwrap()
            .unwrap();
        assert!(result.preserves(&report));
        assert_eq!(result.archived_by.as_deref(), Some("admin1"));

        drop(repo);
        let db = Arc::try_unwrap(db).ok().unwrap();
        let log: Vec<Transaction> = db.into_transaction_log();
        let sql = format!("{log:?}");
        assert!(sql.contains("FOR UPDATE"));
        assert!(sql.contains("INSERT INTO \\\"report_archive\\\""));
        // Every column is copied, including the nullable ones
        for column in ["moderation_notes", "moderated_at", "archived_at", "archived_by"] {
            assert!(sql.contains(&format!("\\\"{column}\\\"")), "{column}");
        }
        assert!(sql.contains("DELETE FROM \\\"report\\\""));
    }

    #[tokio::test]
    async fn test_archive_missing_report() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<report::Model>::new()])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        assert!(repo.archive("missing", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_archive_copy_failure_skips_delete() {
        let report = create_test_report("r1");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[report]])
                .append_query_errors([sea_orm::DbErr::Custom("disk full".to_string())])
                .into_connection(),
        );

        let repo = ReportRepository::new(db.clone());
        let result = repo.archive("r1", None).await;
        assert!(matches!(result, Err(AppError::Database(_))));

        drop(repo);
        let db = Arc::try_unwrap(db).ok().unwrap();
        let sql = format!("{:?}", db.into_transaction_log());
        assert!(!sql.contains("DELETE FROM"));
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[count_row(4)], [count_row(2)], [count_row(1)]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let counts = repo
            .count_by_status(Some(ModerationStatus::Approved))
            .await
            .unwrap();
        assert_eq!(counts.unresolved, 4);
        assert_eq!(counts.in_progress, 2);
        assert_eq!(counts.solved, 1);
        assert_eq!(counts.total(), 7);
    }
}
