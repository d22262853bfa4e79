//! Civic report portal server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use civic_api::{AppState, app};
use civic_common::{Config, NotificationBackend};
use civic_core::{Capabilities, Stores, UserService};
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "civic=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting civic report server...");

    // Load configuration
    let config = Config::load()?;
    let public_url = Url::parse(&config.server.url)?;
    info!(url = %public_url, "Configuration loaded");

    // Connect to database
    let db = civic_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    civic_db::migrate(&db).await?;
    info!("Migrations completed");

    // Moderation needs both the flag and the schema; decided once here
    let schema_ready = civic_db::has_moderation_schema(&db).await?;
    let capabilities = Capabilities::detect(config.moderation.enabled, schema_ready);
    if config.moderation.enabled && !schema_ready {
        warn!("Moderation requested but the schema lacks moderation columns; running without it");
    }
    info!(
        moderation = capabilities.moderation_enabled,
        "Capabilities detected"
    );

    let memory_notifications = config.notifications.backend == NotificationBackend::Memory;
    if memory_notifications {
        warn!("Notifications are kept in memory and will be lost on restart");
    }
    let stores = Stores::database(Arc::new(db), memory_notifications);

    if let (Some(email), Some(password)) = (&config.admin.email, &config.admin.password) {
        UserService::new(Arc::clone(&stores.users))
            .ensure_admin(email, password)
            .await?;
    }

    // Create app state
    let state = AppState::from_config(&config, &stores, capabilities)?;

    // Build router
    let app = app(state)
        .nest_service("/uploads", ServeDir::new(config.upload_dir()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server with graceful shutdown
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
