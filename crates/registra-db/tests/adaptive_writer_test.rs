//! Integration tests for schema-adaptive writes against a live database.

use registra_db::test_fixtures::{SeedUser, TestDatabase};
use registra_db::{adaptive_writer, Error, FieldCandidate, FieldValue, SchemaCatalog};

#[tokio::test]
async fn test_insert_drops_unknown_columns() {
    let test_db = TestDatabase::new().await;
    let columns = test_db.db.catalog.columns_of("users").await.expect("introspect");

    let candidates = vec![
        FieldCandidate::new("first_name", "Ana"),
        FieldCandidate::new("graduation_year", 2026), // not a live column
        FieldCandidate::new("email", "ana@example.com"),
    ];

    let key = adaptive_writer::insert(&test_db.pool, "users", &columns, &candidates, Some("id"))
        .await
        .expect("Insert failed")
        .expect("Expected generated key");
    assert!(key > 0);

    let email: Option<String> = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(key)
        .fetch_one(&test_db.pool)
        .await
        .expect("Fetch failed");
    assert_eq!(email.as_deref(), Some("ana@example.com"));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_insert_skips_empty_unless_kept() {
    let test_db = TestDatabase::new().await;
    let columns = test_db.db.catalog.columns_of("users").await.expect("introspect");

    let candidates = vec![
        FieldCandidate::new("first_name", "Ana"),
        FieldCandidate::new("contact_no", "   "), // blank, dropped
        FieldCandidate::nullable("email", FieldValue::Null),
    ];

    let key = adaptive_writer::insert(&test_db.pool, "users", &columns, &candidates, Some("id"))
        .await
        .expect("Insert failed")
        .expect("Expected generated key");

    let (contact, email): (Option<String>, Option<String>) =
        sqlx::query_as("SELECT contact_no, email FROM users WHERE id = $1")
            .bind(key)
            .fetch_one(&test_db.pool)
            .await
            .expect("Fetch failed");
    assert_eq!(contact, None);
    assert_eq!(email, None);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_constraint_violation_is_write_rejected() {
    let test_db = TestDatabase::new().await;
    test_db
        .seed_user(SeedUser {
            email: Some("taken@example.com"),
            ..Default::default()
        })
        .await;
    let columns = test_db.db.catalog.columns_of("users").await.expect("introspect");

    let candidates = vec![FieldCandidate::new("email", "taken@example.com")];
    let result =
        adaptive_writer::insert(&test_db.pool, "users", &columns, &candidates, Some("id")).await;

    match result {
        Err(Error::WriteRejected(reason)) => assert!(reason.contains("users")),
        other => panic!("Expected WriteRejected, got {:?}", other),
    }

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_no_applicable_columns() {
    let test_db = TestDatabase::new().await;
    let columns = test_db.db.catalog.columns_of("users").await.expect("introspect");

    let candidates = vec![
        FieldCandidate::new("graduation_year", 2026),
        FieldCandidate::new("homeroom", "B2"),
    ];
    let result =
        adaptive_writer::insert(&test_db.pool, "users", &columns, &candidates, Some("id")).await;
    assert!(matches!(result, Err(Error::NoApplicableColumns(_))));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_update_where_backfills_one_row() {
    let test_db = TestDatabase::new().await;
    let user_id = test_db
        .seed_user(SeedUser {
            first_name: Some("Ana"),
            email: Some("ana@example.com"),
            ..Default::default()
        })
        .await;
    let columns = test_db.db.catalog.columns_of("users").await.expect("introspect");

    let affected = adaptive_writer::update_where(
        &test_db.pool,
        "users",
        &columns,
        &[FieldCandidate::new("login_id", "PR-250001")],
        "id",
        &FieldValue::Int(user_id),
    )
    .await
    .expect("Update failed");
    assert_eq!(affected, 1);

    let login: Option<String> = sqlx::query_scalar("SELECT login_id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&test_db.pool)
        .await
        .expect("Fetch failed");
    assert_eq!(login.as_deref(), Some("PR-250001"));

    test_db.cleanup().await;
}
