//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `civic_test`)
//!   `TEST_DB_PASSWORD` (default: `civic_test`)
//!   `TEST_DB_NAME` (default: `civic_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Utc;
use civic_common::AppError;
use civic_db::{
    entities::{
        report::{self, ModerationStatus, ReportStatus},
        user::{self, UserRole},
    },
    has_moderation_schema,
    repositories::{BoundingBox, ReportQuery, ReportRepository, UserRepository},
    test_utils::{TestDatabase, TestDbConfig},
};
use sea_orm::{DatabaseConnection, Set};

fn new_report(id: &str, lat: Option<f64>, lng: Option<f64>) -> report::ActiveModel {
    let now = Utc::now().into();
    report::ActiveModel {
        id: Set(id.to_string()),
        user_id: Set(None),
        title: Set("Clogged drain".to_string()),
        category: Set("cleanliness".to_string()),
        description: Set("Water pools after rain".to_string()),
        location: Set("Mabini St, Barangay 3".to_string()),
        latitude: Set(lat),
        longitude: Set(lng),
        image_path: Set(None),
        status: Set(ReportStatus::Unresolved),
        moderation_status: Set(ModerationStatus::Approved),
        moderation_notes: Set(None),
        moderated_by: Set(None),
        moderated_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

async fn connect() -> (TestDatabase, Arc<DatabaseConnection>) {
    let db = TestDatabase::new().await.expect("Failed to connect");
    db.cleanup().await.unwrap();
    let conn = Arc::new(
        sea_orm::Database::connect(db.config.database_url())
            .await
            .expect("Failed to connect"),
    );
    (db, conn)
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_moderation_schema_detected() {
    let (db, _) = connect().await;
    assert!(has_moderation_schema(db.connection()).await.unwrap());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_archive_moves_row() {
    let (_db, conn) = connect().await;
    let repo = ReportRepository::new(conn);

    let created = repo
        .create(new_report("01j0000000000000000000000a", Some(14.6), Some(121.0)))
        .await
        .unwrap();

    let archived = repo
        .archive(&created.id, Some("admin".to_string()))
        .await
        .unwrap()
        .unwrap();

    assert!(archived.preserves(&created));
    assert!(repo.find_by_id(&created.id).await.unwrap().is_none());
    let stored = repo.find_archived(&created.id).await.unwrap().unwrap();
    assert!(stored.preserves(&created));
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_archive_conflict_keeps_live_row() {
    let (_db, conn) = connect().await;
    let repo = ReportRepository::new(conn);

    let created = repo
        .create(new_report("01j0000000000000000000000b", None, None))
        .await
        .unwrap();
    repo.archive(&created.id, None).await.unwrap();

    // Same ID again: the archive insert hits the primary key and must not delete
    let again = repo
        .create(new_report("01j0000000000000000000000b", None, None))
        .await
        .unwrap();
    assert!(repo.archive(&again.id, None).await.is_err());
    assert!(repo.find_by_id(&again.id).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_map_query_round_trips_coordinates() {
    let (_db, conn) = connect().await;
    let repo = ReportRepository::new(conn);

    repo.create(new_report("01j0000000000000000000000c", Some(14.5995), Some(120.9842)))
        .await
        .unwrap();
    repo.create(new_report("01j0000000000000000000000d", None, None))
        .await
        .unwrap();

    let query = ReportQuery {
        with_coordinates: true,
        bounds: Some(
            BoundingBox {
                min_lat: Some(14.5995),
                max_lat: Some(14.5995),
                min_lng: Some(120.9842),
                max_lng: Some(120.9842),
            }
            .normalized(),
        ),
        limit: 300,
        ..Default::default()
    };
    let rows = repo.list(&query).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].coordinates(), Some((14.5995, 120.9842)));
}

fn new_user(id: &str, email: &str) -> user::ActiveModel {
    let now = Utc::now().into();
    user::ActiveModel {
        id: Set(id.to_string()),
        email: Set(email.to_string()),
        first_name: Set(None),
        last_name: Set(None),
        mobile: Set(None),
        password_hash: Set("$argon2id$placeholder".to_string()),
        token: Set(None),
        role: Set(UserRole::Resident),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_email_is_conflict() {
    let (_db, conn) = connect().await;
    let repo = UserRepository::new(conn);

    repo.create(new_user("01j0000000000000000000000u", "ana@example.com"))
        .await
        .unwrap();
    let err = repo
        .create(new_user("01j0000000000000000000000v", "ana@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(config.database_url().starts_with("postgres://"));
}
