//! Report service: submission and every read path.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use civic_common::{report_photo_key, AppError, AppResult, IdGenerator, PhotoFormat, StorageBackend};
use civic_db::{
    entities::{
        report::{self, ModerationStatus, ReportStatus},
        user,
    },
    repositories::{BoundingBox, StatusCounts},
};
use serde::Serialize;

use super::{
    gate::{require_admin, Audience, ListFilters, ModerationGate},
    map_cache::MapFeedCache,
    notification::NotificationService,
    visibility::{Projector, ReportView},
};
use crate::store::{ReportStoreRef, Stores, UserStoreRef};

const MAX_TITLE_CHARS: usize = 150;
const MAX_CATEGORY_CHARS: usize = 64;
const MAX_LOCATION_CHARS: usize = 255;
const MAX_DESCRIPTION_CHARS: usize = 5000;

/// Rules applied to new submissions.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionPolicy {
    /// Reject submissions without a photo.
    pub require_photo: bool,
    /// Largest accepted photo.
    pub max_upload_bytes: usize,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self {
            require_photo: false,
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Raw submission as received from the form. Values are untrimmed.
#[derive(Debug, Clone, Default)]
pub struct SubmitReportInput {
    pub title: String,
    pub category: String,
    pub description: String,
    pub location: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub photo: Option<Vec<u8>>,
}

/// Result of a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedReport {
    pub report: ReportView,
    pub warnings: Vec<String>,
}

/// Counts shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub moderation_enabled: bool,
    pub total_reports: u64,
    pub status_counts: StatusCounts,
    pub pending_moderation: u64,
}

struct ValidSubmission {
    title: String,
    category: String,
    description: String,
    location: String,
    coordinates: Option<(f64, f64)>,
    photo: Option<(Vec<u8>, PhotoFormat)>,
}

/// Report service for business logic.
#[derive(Clone)]
pub struct ReportService {
    reports: ReportStoreRef,
    users: UserStoreRef,
    notifications: NotificationService,
    storage: Arc<dyn StorageBackend>,
    gate: ModerationGate,
    projector: Arc<Projector>,
    map_cache: MapFeedCache,
    policy: SubmissionPolicy,
    id_gen: IdGenerator,
}

impl ReportService {
    /// Create a new report service.
    #[must_use]
    pub fn new(
        stores: &Stores,
        storage: Arc<dyn StorageBackend>,
        gate: ModerationGate,
        projector: Arc<Projector>,
        map_cache: MapFeedCache,
        policy: SubmissionPolicy,
    ) -> Self {
        Self {
            reports: Arc::clone(&stores.reports),
            users: Arc::clone(&stores.users),
            notifications: NotificationService::new(Arc::clone(&stores.notifications)),
            storage,
            gate,
            projector,
            map_cache,
            policy,
            id_gen: IdGenerator::new(),
        }
    }

    /// Validate, store the photo, insert, then notify the author.
    pub async fn submit(
        &self,
        author: Option<&user::Model>,
        input: SubmitReportInput,
    ) -> AppResult<SubmittedReport> {
        let valid = self.validate(input)?;
        let mut warnings = Vec::new();
        if valid.coordinates.is_none() {
            warnings.push("No map coordinates given; the report will not appear on the map".to_string());
        }

        let image_key = match &valid.photo {
            Some((data, format)) => {
                let key = report_photo_key(&self.id_gen.generate(), *format);
                self.storage.upload(&key, data).await?;
                Some(key)
            }
            None => None,
        };

        let now = Utc::now().into();
        let model = report::Model {
            id: self.id_gen.generate(),
            user_id: author.map(|u| u.id.clone()),
            title: valid.title,
            category: valid.category,
            description: valid.description,
            location: valid.location,
            latitude: valid.coordinates.map(|(lat, _)| lat),
            longitude: valid.coordinates.map(|(_, lng)| lng),
            image_path: image_key.clone(),
            status: ReportStatus::Unresolved,
            moderation_status: self.gate.initial_moderation(),
            moderation_notes: None,
            moderated_by: None,
            moderated_at: None,
            created_at: now,
            updated_at: now,
        };

        let report = match self.reports.insert(model).await {
            Ok(report) => report,
            Err(e) => {
                if let Some(key) = image_key
                    && let Err(cleanup) = self.storage.delete(&key).await
                {
                    tracing::warn!(key = %key, error = %cleanup, "Failed to remove orphaned photo");
                }
                return Err(e);
            }
        };

        self.map_cache.invalidate();
        self.notifications
            .report_submitted(&report, self.gate.moderation_enabled())
            .await;

        tracing::info!(
            report_id = %report.id,
            moderation = report.moderation_status.as_str(),
            "Report submitted"
        );

        let audience = match author {
            Some(u) if u.is_admin() => Audience::Admin,
            _ => Audience::Owner,
        };
        Ok(SubmittedReport {
            report: self.projector.project(&report, author, audience),
            warnings,
        })
    }

    fn validate(&self, input: SubmitReportInput) -> AppResult<ValidSubmission> {
        let mut errors = Vec::new();

        let category = required(&input.category, "Category", MAX_CATEGORY_CHARS, &mut errors);
        let title = required(&input.title, "Title", MAX_TITLE_CHARS, &mut errors);
        let description = required(
            &input.description,
            "Description",
            MAX_DESCRIPTION_CHARS,
            &mut errors,
        );
        let location = required(&input.location, "Location", MAX_LOCATION_CHARS, &mut errors);

        let latitude = coordinate(input.latitude.as_deref(), "latitude", 90.0, &mut errors);
        let longitude = coordinate(input.longitude.as_deref(), "longitude", 180.0, &mut errors);
        let coordinates = match (latitude, longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            (None, None) => None,
            _ => {
                errors.push("Latitude and longitude must be given together".to_string());
                None
            }
        };

        let photo = match input.photo.filter(|data| !data.is_empty()) {
            None => {
                if self.policy.require_photo {
                    errors.push("Photo is required".to_string());
                }
                None
            }
            Some(data) if data.len() > self.policy.max_upload_bytes => {
                errors.push(format!(
                    "Photo upload failed: file exceeds {} bytes",
                    self.policy.max_upload_bytes
                ));
                None
            }
            Some(data) => match PhotoFormat::detect(&data) {
                Some(format) => Some((data, format)),
                None => {
                    errors.push("Photo upload failed: only JPEG, PNG and WebP are accepted".to_string());
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(AppError::Validation(errors.join("; ")));
        }

        Ok(ValidSubmission {
            title,
            category,
            description,
            location,
            coordinates,
            photo,
        })
    }

    /// One report, if `viewer` may see it. Hidden reports look missing.
    pub async fn get(&self, viewer: Option<&user::Model>, id: &str) -> AppResult<ReportView> {
        let report = self
            .reports
            .find_by_id(id)
            .await?
            .filter(|r| self.gate.can_view(viewer, r))
            .ok_or_else(|| AppError::ReportNotFound(id.to_string()))?;

        let mut views = self.project_all(viewer, vec![report]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::Internal("projection dropped a report".to_string()))
    }

    /// Gate-filtered listing.
    pub async fn list(
        &self,
        viewer: Option<&user::Model>,
        filters: &ListFilters,
    ) -> AppResult<Vec<ReportView>> {
        let query = self.gate.list_query(viewer, filters)?;
        let reports = self.reports.list(&query).await?;
        self.project_all(viewer, reports).await
    }

    /// Public map feed for a viewport. Cached briefly per normalized box.
    pub async fn map_feed(&self, bounds: BoundingBox) -> AppResult<Arc<Vec<ReportView>>> {
        let query = self.gate.map_query(bounds);
        let key = query.cache_key();
        if let Some(hit) = self.map_cache.get(&key).await {
            return Ok(hit);
        }

        let reports = self.reports.list(&query).await?;
        let views = Arc::new(self.project_all(None, reports).await?);
        self.map_cache.insert(key, Arc::clone(&views)).await;
        Ok(views)
    }

    /// Dashboard counts over publicly visible reports.
    pub async fn summary(&self, viewer: &user::Model) -> AppResult<DashboardSummary> {
        require_admin(viewer)?;
        let status_counts = self.reports.count_by_status(self.gate.public_scope()).await?;
        let pending_moderation = if self.gate.moderation_enabled() {
            self.reports
                .count_by_moderation(ModerationStatus::Pending)
                .await?
        } else {
            0
        };
        Ok(DashboardSummary {
            moderation_enabled: self.gate.moderation_enabled(),
            total_reports: status_counts.total(),
            status_counts,
            pending_moderation,
        })
    }

    /// Reports awaiting review, newest first. Empty when moderation is off.
    pub async fn moderation_queue(&self, viewer: &user::Model) -> AppResult<Vec<ReportView>> {
        require_admin(viewer)?;
        let Some(query) = self.gate.queue_query() else {
            return Ok(Vec::new());
        };
        let reports = self.reports.list(&query).await?;
        self.project_all(Some(viewer), reports).await
    }

    async fn project_all(
        &self,
        viewer: Option<&user::Model>,
        reports: Vec<report::Model>,
    ) -> AppResult<Vec<ReportView>> {
        let author_ids: Vec<String> = reports.iter().filter_map(|r| r.user_id.clone()).collect();
        let authors: HashMap<String, user::Model> = if author_ids.is_empty() {
            HashMap::new()
        } else {
            self.users
                .find_by_ids(&author_ids)
                .await?
                .into_iter()
                .map(|u| (u.id.clone(), u))
                .collect()
        };

        Ok(reports
            .iter()
            .map(|r| {
                let author = r.user_id.as_ref().and_then(|id| authors.get(id));
                self.projector
                    .project(r, author, Audience::of(viewer, r))
            })
            .collect())
    }
}

fn required(raw: &str, field: &str, max_chars: usize, errors: &mut Vec<String>) -> String {
    let value = raw.trim();
    if value.is_empty() {
        errors.push(format!("{field} is required"));
    } else if value.chars().count() > max_chars {
        errors.push(format!("{field} must be at most {max_chars} characters"));
    }
    value.to_string()
}

fn coordinate(raw: Option<&str>, name: &str, limit: f64, errors: &mut Vec<String>) -> Option<f64> {
    let raw = raw.map(str::trim).filter(|v| !v.is_empty())?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() <= limit => Some(v),
        Ok(_) => {
            errors.push(format!("{} out of range", capitalize_ascii(name)));
            None
        }
        Err(_) => {
            errors.push(format!("Invalid {name} value"));
            None
        }
    }
}

fn capitalize_ascii(word: &str) -> String {
    let mut out = word.to_string();
    if let Some(first) = out.get_mut(..1) {
        first.make_ascii_uppercase();
    }
    out
}
