//! Notification inbox endpoints.

use axum::{
    Router,
    extract::{Path, State},
    routing::{get, post},
};
use civic_common::{AppError, AppResult};
use civic_db::entities::notification::{Model as NotificationModel, NotificationType};
use serde::{Deserialize, Serialize};

use super::is_truthy;
use crate::{
    extractors::{ApiQuery, AuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Inbox query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxQuery {
    /// Maximum results (default: 20, max: 100)
    pub limit: Option<u64>,
    /// `1`, `true` or `yes`
    pub unread_only: Option<String>,
}

/// Notification response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    pub title: String,
    pub meta: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub created_at: String,
}

impl From<NotificationModel> for NotificationResponse {
    fn from(n: NotificationModel) -> Self {
        Self {
            id: n.id,
            title: n.title,
            meta: n.meta,
            notification_type: n.notification_type,
            is_read: n.is_read,
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Newest-first inbox page.
async fn list_notifications(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<InboxQuery>,
) -> AppResult<ApiResponse<Vec<NotificationResponse>>> {
    let unread_only = is_truthy(query.unread_only.as_deref());
    let notifications = state
        .notification_service
        .list(&user.id, query.limit, unread_only)
        .await?;
    Ok(ApiResponse::ok(
        notifications.into_iter().map(Into::into).collect(),
    ))
}

async fn unread_count(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<CountResponse>> {
    let count = state.notification_service.unread_count(&user.id).await?;
    Ok(ApiResponse::ok(CountResponse { count }))
}

/// Mark one notification as read.
async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    if !state.notification_service.mark_read(&user.id, &id).await? {
        return Err(AppError::NotFound(format!("Notification {id}")));
    }
    Ok(ApiResponse::message("Marked as read"))
}

async fn mark_all_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<CountResponse>> {
    let count = state.notification_service.mark_all_read(&user.id).await?;
    Ok(ApiResponse::ok(CountResponse { count }))
}

/// Delete every notification in the inbox.
async fn clear(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<CountResponse>> {
    let count = state.notification_service.clear(&user.id).await?;
    Ok(ApiResponse::ok(CountResponse { count }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/clear", post(clear))
        .route("/{id}/read", post(mark_read))
}
