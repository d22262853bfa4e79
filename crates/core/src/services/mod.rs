//! Business logic services.

#![allow(missing_docs)]

pub mod gate;
pub mod lifecycle;
pub mod map_cache;
pub mod notification;
pub mod report;
pub mod user;
pub mod visibility;

pub use gate::{require_admin, Audience, Capabilities, ListFilters, ModerationGate};
pub use lifecycle::{LifecycleService, MAX_NOTES_CHARS, MODERATION_UNAVAILABLE};
pub use map_cache::MapFeedCache;
pub use notification::{ModerationDecision, NotificationService, MAX_INBOX_LIMIT};
pub use report::{
    DashboardSummary, ReportService, SubmissionPolicy, SubmitReportInput, SubmittedReport,
};
pub use user::{SigninInput, SignupInput, UserService};
pub use visibility::{
    category_label, moderation_label, status_label, summarize_location, user_initials, Projector,
    ReportView,
};
