//! Repositories.

pub mod notification;
pub mod report;
pub mod user;

pub use notification::NotificationRepository;
pub use report::{BoundingBox, ReportQuery, ReportRepository, StatusCounts};
pub use user::UserRepository;
