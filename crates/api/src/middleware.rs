//! API middleware.

#![allow(missing_docs)]

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use civic_common::{AppResult, Config, LocalStorage, StorageBackend};
use civic_core::{
    Capabilities, LifecycleService, MapFeedCache, ModerationGate, NotificationService, Projector,
    ReportService, Stores, SubmissionPolicy, UserService,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub report_service: ReportService,
    pub lifecycle_service: LifecycleService,
    pub notification_service: NotificationService,
    pub capabilities: Capabilities,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wire every service from configuration, the chosen stores and the
    /// capabilities detected at startup.
    pub fn from_config(
        config: &Config,
        stores: &Stores,
        capabilities: Capabilities,
    ) -> AppResult<Self> {
        let timezone = config.timezone()?;
        let gate = ModerationGate::new(
            capabilities,
            config.reports.list_limit,
            config.reports.map_limit,
        );
        let projector = Arc::new(Projector::new(
            config.storage.root.clone(),
            timezone,
            capabilities.moderation_enabled,
        ));
        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(config.storage.root.clone()));
        let map_cache = MapFeedCache::new(Duration::from_secs(config.reports.map_cache_ttl_secs));
        let policy = SubmissionPolicy {
            require_photo: config.reports.require_photo,
            max_upload_bytes: config.storage.max_upload_bytes,
        };

        Ok(Self {
            user_service: UserService::new(Arc::clone(&stores.users)),
            report_service: ReportService::new(
                stores,
                storage,
                gate,
                projector,
                map_cache.clone(),
                policy,
            ),
            lifecycle_service: LifecycleService::new(stores, gate, map_cache),
            notification_service: NotificationService::new(Arc::clone(&stores.notifications)),
            capabilities,
            max_upload_bytes: config.storage.max_upload_bytes,
        })
    }
}

/// Authentication middleware.
///
/// A valid bearer token puts the user into request extensions. Invalid or
/// missing tokens leave the request anonymous; handlers decide whether that
/// is acceptable.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.user_service.authenticate_by_token(token.trim()).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) if e.is_server_error() => {
                tracing::warn!(error = %e, "Token lookup failed");
            }
            Err(_) => {}
        }
    }

    next.run(req).await
}
