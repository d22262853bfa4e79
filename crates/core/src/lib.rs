//! Core business logic for civic-report.
//!
//! Services here own every rule about who may see or change a report. They
//! depend on the store traits in [`store`], which the database repositories
//! and the in-memory stores in [`memory`] both implement.

pub mod memory;
pub mod services;
pub mod store;

pub use memory::{MemoryNotificationStore, MemoryReportStore, MemoryUserStore};
pub use services::*;
pub use store::{
    NotificationStore, NotificationStoreRef, ReportStore, ReportStoreRef, Stores, UserStore,
    UserStoreRef,
};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
    use civic_db::entities::{
        report::{self, ModerationStatus, ReportStatus},
        user::{self, UserRole},
    };

    pub fn at(minutes: i64) -> DateTime<FixedOffset> {
        let base = Utc.with_ymd_and_hms(2025, 3, 4, 1, 30, 0).single().unwrap_or_default();
        (base + Duration::minutes(minutes)).into()
    }

    fn user_with_role(id: &str, role: UserRole) -> user::Model {
        user::Model {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            first_name: None,
            last_name: None,
            mobile: None,
            password_hash: String::new(),
            token: Some(format!("token-{id}")),
            role,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    pub fn resident(id: &str) -> user::Model {
        user_with_role(id, UserRole::Resident)
    }

    pub fn admin(id: &str) -> user::Model {
        user_with_role(id, UserRole::Admin)
    }

    pub fn report(id: &str, owner: Option<&str>, moderation: ModerationStatus) -> report::Model {
        report::Model {
            id: id.to_string(),
            user_id: owner.map(ToString::to_string),
            title: format!("Report {id}"),
            category: "public_safety".to_string(),
            description: "Broken streetlight near the plaza".to_string(),
            location: "Rizal Ave, Barangay 5, Quezon City".to_string(),
            latitude: Some(14.6507),
            longitude: Some(121.0494),
            image_path: None,
            status: ReportStatus::Unresolved,
            moderation_status: moderation,
            moderation_notes: None,
            moderated_by: None,
            moderated_at: None,
            created_at: at(0),
            updated_at: at(0),
        }
    }
}
