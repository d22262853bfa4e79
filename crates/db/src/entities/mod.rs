//! Database entities.

pub mod notification;
pub mod report;
pub mod report_archive;
pub mod user;

pub use notification::Entity as Notification;
pub use report::Entity as Report;
pub use report_archive::Entity as ReportArchive;
pub use user::Entity as User;
