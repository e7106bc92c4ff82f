//! Integration tests for role-identifier allocation.

use registra_db::test_fixtures::{SeedUser, TestDatabase};
use registra_db::{IdentifierAllocator, SequenceSource};

fn default_sources() -> Vec<SequenceSource> {
    vec![
        SequenceSource::new("users", "login_id"),
        SequenceSource::new("archived_users", "login_id"),
    ]
}

#[tokio::test]
async fn test_first_identifier_of_an_epoch() {
    let test_db = TestDatabase::new().await;

    let id = test_db
        .db
        .identifiers
        .next_id("PR", 25, &default_sources())
        .await
        .expect("Failed to allocate");
    assert_eq!(id, "PR-250001");

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_increments_past_existing_maximum() {
    let test_db = TestDatabase::new().await;

    test_db
        .seed_user(SeedUser {
            login_id: Some("PR-250007"),
            email: Some("a@example.com"),
            ..Default::default()
        })
        .await;
    test_db
        .seed_user(SeedUser {
            login_id: Some("PR-250003"),
            email: Some("b@example.com"),
            ..Default::default()
        })
        .await;

    let id = test_db
        .db
        .identifiers
        .next_id("PR", 25, &default_sources())
        .await
        .expect("Failed to allocate");
    assert_eq!(id, "PR-250008");

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_merges_maxima_across_sources() {
    let test_db = TestDatabase::new().await;

    test_db
        .seed_user(SeedUser {
            login_id: Some("TR-250007"),
            email: Some("live@example.com"),
            ..Default::default()
        })
        .await;
    sqlx::query("INSERT INTO archived_users (user_id, login_id) VALUES (99, 'TR-250012')")
        .execute(&test_db.pool)
        .await
        .expect("Failed to seed archive row");

    let id = test_db
        .db
        .identifiers
        .next_id("TR", 25, &default_sources())
        .await
        .expect("Failed to allocate");
    assert_eq!(id, "TR-250013");

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_missing_source_table_is_skipped() {
    let test_db = TestDatabase::new().await;

    test_db
        .seed_user(SeedUser {
            login_id: Some("AD-250002"),
            email: Some("ad@example.com"),
            ..Default::default()
        })
        .await;

    let sources = vec![
        SequenceSource::new("users", "login_id"),
        SequenceSource::new("retired_staff", "login_id"),
    ];
    let id = test_db
        .db
        .identifiers
        .next_id("AD", 25, &sources)
        .await
        .expect("Failed to allocate");
    assert_eq!(id, "AD-250003");

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_other_prefixes_and_epochs_do_not_interfere() {
    let test_db = TestDatabase::new().await;

    test_db
        .seed_user(SeedUser {
            login_id: Some("TR-250042"),
            email: Some("t@example.com"),
            ..Default::default()
        })
        .await;
    test_db
        .seed_user(SeedUser {
            login_id: Some("PR-240099"),
            email: Some("p@example.com"),
            ..Default::default()
        })
        .await;

    let id = test_db
        .db
        .identifiers
        .next_id("PR", 25, &default_sources())
        .await
        .expect("Failed to allocate");
    assert_eq!(id, "PR-250001");

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_overflow_widens_the_sequence() {
    let test_db = TestDatabase::new().await;

    test_db
        .seed_user(SeedUser {
            login_id: Some("PR-259999"),
            email: Some("full@example.com"),
            ..Default::default()
        })
        .await;

    let id = test_db
        .db
        .identifiers
        .next_id("PR", 25, &default_sources())
        .await
        .expect("Failed to allocate");
    assert_eq!(id, "PR-2510000");

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_malformed_values_in_source_are_ignored() {
    let test_db = TestDatabase::new().await;

    test_db
        .seed_user(SeedUser {
            login_id: Some("PR-25oops"),
            email: Some("junk@example.com"),
            ..Default::default()
        })
        .await;

    let id = test_db
        .db
        .identifiers
        .next_id("PR", 25, &default_sources())
        .await
        .expect("Failed to allocate");
    assert_eq!(id, "PR-250001");

    test_db.cleanup().await;
}
