//! API endpoints.

mod admin;
mod auth;
mod notifications;
mod reports;

use axum::Router;

use crate::middleware::AppState;

pub use reports::{ListReportsQuery, MapQuery};

/// Lenient query flag: `1`, `true` or `yes`, case-insensitive.
fn is_truthy(raw: Option<&str>) -> bool {
    raw.map(str::trim)
        .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Create the API router. `max_upload_bytes` bounds the photo accepted by
/// report submission.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .nest("/reports", reports::router(max_upload_bytes))
        .nest("/admin", admin::router())
        .nest("/notifications", notifications::router())
}
