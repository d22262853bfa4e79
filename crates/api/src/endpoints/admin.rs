//! Staff dashboard endpoints.

use axum::{Router, extract::State, routing::get};
use civic_common::AppResult;
use civic_core::{DashboardSummary, ReportView};

use crate::{extractors::AdminUser, middleware::AppState, response::ApiResponse};

/// Per-status counts over publicly visible reports.
async fn summary(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<ApiResponse<DashboardSummary>> {
    let summary = state.report_service.summary(&admin).await?;
    Ok(ApiResponse::ok(summary))
}

/// Reports waiting for a moderation decision.
async fn moderation_queue(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<ApiResponse<Vec<ReportView>>> {
    let queue = state.report_service.moderation_queue(&admin).await?;
    Ok(ApiResponse::ok(queue))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(summary))
        .route("/moderation-queue", get(moderation_queue))
}
