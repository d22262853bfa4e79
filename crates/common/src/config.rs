//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Moderation workflow configuration.
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// Report submission and listing configuration.
    #[serde(default)]
    pub reports: ReportConfig,
    /// Upload storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Notification store configuration.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Optional administrator seeded at startup.
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this portal.
    pub url: String,
    /// IANA timezone used when rendering timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Moderation configuration.
///
/// The effective capability also requires the moderation columns to exist
/// in the schema; see the server startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    /// Whether the moderation workflow is requested.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Report configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Whether a photo is mandatory on submission.
    #[serde(default)]
    pub require_photo: bool,
    /// Maximum rows returned by the report list.
    #[serde(default = "default_list_limit")]
    pub list_limit: u64,
    /// Maximum rows returned by the map feed.
    #[serde(default = "default_map_limit")]
    pub map_limit: u64,
    /// Seconds a map feed result stays cached.
    #[serde(default = "default_map_cache_ttl")]
    pub map_cache_ttl_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            require_photo: false,
            list_limit: default_list_limit(),
            map_limit: default_map_limit(),
            map_cache_ttl_secs: default_map_cache_ttl(),
        }
    }
}

/// Upload storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Public web root; photos live under `{root}/uploads`.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Maximum accepted photo size in bytes.
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

/// Where notifications are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationBackend {
    /// The `notification` table.
    #[default]
    Database,
    /// Process memory, lost on restart.
    Memory,
}

/// Notification configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    /// Selected backend.
    #[serde(default)]
    pub backend: NotificationBackend,
}

/// Administrator seeding configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Admin email.
    #[serde(default)]
    pub email: Option<String>,
    /// Admin password.
    #[serde(default)]
    pub password: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

fn default_timezone() -> String {
    "Asia/Manila".to_string()
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_true() -> bool {
    true
}

const fn default_list_limit() -> u64 {
    200
}

const fn default_map_limit() -> u64 {
    300
}

const fn default_map_cache_ttl() -> u64 {
    5
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./public")
}

const fn default_max_upload() -> usize {
    5 * 1024 * 1024
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `CIVIC_ENV`)
    /// 3. Environment variables with `CIVIC_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("CIVIC_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CIVIC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("CIVIC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Parsed display timezone.
    pub fn timezone(&self) -> Result<chrono_tz::Tz, config::ConfigError> {
        self.server
            .timezone
            .parse()
            .map_err(|_| config::ConfigError::Message(format!(
                "unknown timezone: {}",
                self.server.timezone
            )))
    }

    /// Directory holding uploaded photos.
    #[must_use]
    pub fn upload_dir(&self) -> PathBuf {
        self.storage.root.join("uploads")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse(
            r#"
            [server]
            url = "http://localhost:3000"
            [database]
            url = "postgres://localhost/civic"
            "#,
        );

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.timezone, "Asia/Manila");
        assert!(config.moderation.enabled);
        assert!(!config.reports.require_photo);
        assert_eq!(config.reports.list_limit, 200);
        assert_eq!(config.reports.map_limit, 300);
        assert_eq!(config.reports.map_cache_ttl_secs, 5);
        assert_eq!(config.storage.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(config.notifications.backend, NotificationBackend::Database);
        assert!(config.admin.email.is_none());
        assert_eq!(config.upload_dir(), PathBuf::from("./public/uploads"));
    }

    #[test]
    fn test_explicit_sections() {
        let config = parse(
            r#"
            [server]
            url = "http://localhost:3000"
            timezone = "UTC"
            [database]
            url = "postgres://localhost/civic"
            [moderation]
            enabled = false
            [reports]
            require_photo = true
            [notifications]
            backend = "memory"
            "#,
        );

        assert!(!config.moderation.enabled);
        assert!(config.reports.require_photo);
        assert_eq!(config.notifications.backend, NotificationBackend::Memory);
        assert_eq!(config.timezone().unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let config = parse(
            r#"
            [server]
            url = "http://localhost:3000"
            timezone = "Mars/Olympus"
            [database]
            url = "postgres://localhost/civic"
            "#,
        );

        assert!(config.timezone().is_err());
    }
}
