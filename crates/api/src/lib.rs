//! HTTP API layer for the civic reporting portal.
//!
//! - **Endpoints**: accounts, reports, staff dashboard, notification inbox
//! - **Extractors**: `AuthUser`, `MaybeAuthUser`, `AdminUser`
//! - **Middleware**: bearer-token authentication and application state
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

use axum::{Router, middleware::from_fn_with_state};

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};

/// The `/api` tree with authentication applied, ready for outer layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", router(state.max_upload_bytes))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
