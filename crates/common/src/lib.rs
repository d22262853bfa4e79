//! Common utilities and shared types for civic-report.
//!
//! This crate provides foundational components used across all civic-report crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Storage**: Local file storage for report photos
//!
//! # Example
//!
//! ```no_run
//! use civic_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID {} for {}", id, config.server.url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use config::{
    AdminConfig, Config, DatabaseConfig, ModerationConfig, NotificationBackend,
    NotificationConfig, ReportConfig, ServerConfig, StorageSettings,
};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{LocalStorage, PhotoFormat, StorageBackend, report_photo_key};
