//! Report endpoints.

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
};
use civic_common::{AppError, AppResult};
use civic_core::{
    ListFilters, ReportView, SubmitReportInput, SubmittedReport, moderation_label, status_label,
};
use civic_db::{
    entities::report::{ModerationStatus, ReportStatus},
    repositories::BoundingBox,
};
use serde::{Deserialize, Serialize};

use super::is_truthy;
use crate::{
    extractors::{AdminUser, ApiJson, ApiQuery, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Room for the text fields and multipart framing on top of the photo.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// List query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListReportsQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub mine: Option<String>,
    pub moderation: Option<String>,
}

impl ListReportsQuery {
    fn into_filters(self) -> ListFilters {
        ListFilters {
            mine: is_truthy(self.mine.as_deref()),
            status: self.status,
            category: self.category,
            moderation: self.moderation,
        }
    }
}

/// Map viewport. Accepts `minLat`/`maxLat`/`minLng`/`maxLng`,
/// `south`/`north`/`west`/`east`, or `bbox=west,south,east,north`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapQuery {
    pub min_lat: Option<String>,
    pub max_lat: Option<String>,
    pub min_lng: Option<String>,
    pub max_lng: Option<String>,
    pub south: Option<String>,
    pub north: Option<String>,
    pub west: Option<String>,
    pub east: Option<String>,
    pub bbox: Option<String>,
}

impl MapQuery {
    /// Parse into a bounding box. Any present but malformed value fails.
    pub fn bounds(&self) -> AppResult<BoundingBox> {
        if let Some(bbox) = self.bbox.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            let parts = bbox
                .split(',')
                .map(|p| parse_bound("bbox", Some(p)))
                .collect::<AppResult<Vec<_>>>()?;
            let [Some(west), Some(south), Some(east), Some(north)] = parts.as_slice() else {
                return Err(AppError::Validation(
                    "bbox must be west,south,east,north".to_string(),
                ));
            };
            return Ok(BoundingBox {
                min_lat: Some(*south),
                max_lat: Some(*north),
                min_lng: Some(*west),
                max_lng: Some(*east),
            });
        }

        Ok(BoundingBox {
            min_lat: parse_bound("minLat", self.min_lat.as_deref().or(self.south.as_deref()))?,
            max_lat: parse_bound("maxLat", self.max_lat.as_deref().or(self.north.as_deref()))?,
            min_lng: parse_bound("minLng", self.min_lng.as_deref().or(self.west.as_deref()))?,
            max_lng: parse_bound("maxLng", self.max_lng.as_deref().or(self.east.as_deref()))?,
        })
    }
}

fn parse_bound(name: &str, raw: Option<&str>) -> AppResult<Option<f64>> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| AppError::Validation(format!("Invalid {name} value: {raw}")))
}

/// List reports visible to the caller.
async fn list_reports(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    ApiQuery(query): ApiQuery<ListReportsQuery>,
) -> AppResult<ApiResponse<Vec<ReportView>>> {
    let views = state
        .report_service
        .list(viewer.as_ref(), &query.into_filters())
        .await?;
    Ok(ApiResponse::ok(views))
}

/// Public map feed.
async fn map_feed(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MapQuery>,
) -> AppResult<ApiResponse<Arc<Vec<ReportView>>>> {
    let bounds = query.bounds()?;
    let views = state.report_service.map_feed(bounds).await?;
    Ok(ApiResponse::ok(views))
}

/// Get one report.
async fn show_report(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ReportView>> {
    let view = state.report_service.get(viewer.as_ref(), &id).await?;
    Ok(ApiResponse::ok(view))
}

/// Submit a report (multipart form).
async fn create_report(
    State(state): State<AppState>,
    MaybeAuthUser(author): MaybeAuthUser,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<SubmittedReport>> {
    let mut input = SubmitReportInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "photo" {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            if !data.is_empty() {
                input.photo = Some(data.to_vec());
            }
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        match name.as_str() {
            "title" => input.title = text,
            "category" => input.category = text,
            "description" => input.description = text,
            "location" => input.location = text,
            "latitude" | "location_lat" => input.latitude = Some(text),
            "longitude" | "location_lng" => input.longitude = Some(text),
            _ => {}
        }
    }

    let submitted = state.report_service.submit(author.as_ref(), input).await?;
    Ok(ApiResponse::ok(submitted).with_message("Report submitted"))
}

/// Moderation request.
#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    #[serde(default)]
    pub decision: String,
    pub notes: Option<String>,
}

/// Moderation result.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerateResponse {
    pub id: String,
    pub moderation_status: ModerationStatus,
    pub moderation_label: &'static str,
}

/// Approve or deny a report.
async fn moderate_report(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ModerateRequest>,
) -> AppResult<ApiResponse<ModerateResponse>> {
    let report = state
        .lifecycle_service
        .moderate(&admin, &id, &req.decision, req.notes.as_deref())
        .await?;
    Ok(ApiResponse::ok(ModerateResponse {
        id: report.id,
        moderation_status: report.moderation_status,
        moderation_label: moderation_label(report.moderation_status),
    }))
}

/// Status change request.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: String,
}

/// Status change result.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub id: String,
    pub status: ReportStatus,
    pub status_label: &'static str,
}

/// Change the operational status.
async fn update_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> AppResult<ApiResponse<StatusResponse>> {
    let report = state
        .lifecycle_service
        .set_status(&admin, &id, &req.status)
        .await?;
    Ok(ApiResponse::ok(StatusResponse {
        id: report.id,
        status: report.status,
        status_label: status_label(report.status),
    }))
}

/// Archive result.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResponse {
    pub id: String,
    pub archived_at: String,
}

/// Move a report to the archive.
async fn archive_report(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ArchiveResponse>> {
    let archived = state.lifecycle_service.archive(&admin, &id).await?;
    Ok(ApiResponse::ok(ArchiveResponse {
        id: archived.id,
        archived_at: archived.archived_at.to_rfc3339(),
    })
    .with_message("Report archived"))
}

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_reports).post(create_report).layer(DefaultBodyLimit::max(
                max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES),
            )),
        )
        .route("/map", get(map_feed))
        .route("/{id}", get(show_report))
        .route("/{id}/moderate", post(moderate_report))
        .route("/{id}/status", post(update_status))
        .route("/{id}/archive", post(archive_report))
}
