//! End-to-end provisioning tests: identifier allocation plus adaptive insert.

use registra_db::test_fixtures::{SeedUser, TestDatabase};
use registra_db::{
    Error, FieldCandidate, ProvisionRequest, ProvisioningRepository, SequenceSource,
};

fn principal_request(email: &str) -> ProvisionRequest {
    ProvisionRequest {
        table: "users".to_string(),
        key_column: "id".to_string(),
        identifier_column: "login_id".to_string(),
        prefix: "PR".to_string(),
        epoch: Some(25),
        sources: vec![
            SequenceSource::new("users", "login_id"),
            SequenceSource::new("archived_users", "login_id"),
        ],
        fields: vec![
            FieldCandidate::new("first_name", "Ana"),
            FieldCandidate::new("last_name", "Cruz"),
            FieldCandidate::new("email", email),
            FieldCandidate::new("role", "principal"),
        ],
    }
}

#[tokio::test]
async fn test_provision_mints_sequential_identifiers() {
    let test_db = TestDatabase::new().await;

    let first = test_db
        .db
        .provisioning
        .provision(principal_request("first@example.com"))
        .await
        .expect("Provision failed");
    assert_eq!(first.identifier, "PR-250001");

    let second = test_db
        .db
        .provisioning
        .provision(principal_request("second@example.com"))
        .await
        .expect("Provision failed");
    assert_eq!(second.identifier, "PR-250002");
    assert_ne!(first.key, second.key);

    let stored: Option<String> = sqlx::query_scalar("SELECT login_id FROM users WHERE id = $1")
        .bind(second.key)
        .fetch_one(&test_db.pool)
        .await
        .expect("Fetch failed");
    assert_eq!(stored.as_deref(), Some("PR-250002"));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_provision_counts_archived_identifiers() {
    let test_db = TestDatabase::new().await;

    sqlx::query("INSERT INTO archived_users (user_id, login_id) VALUES (7, 'PR-250009')")
        .execute(&test_db.pool)
        .await
        .expect("Failed to seed archive row");

    let outcome = test_db
        .db
        .provisioning
        .provision(principal_request("next@example.com"))
        .await
        .expect("Provision failed");
    assert_eq!(outcome.identifier, "PR-250010");

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_provision_missing_table_fails() {
    let test_db = TestDatabase::new().await;

    let mut request = principal_request("nobody@example.com");
    request.table = "staff_members".to_string();
    request.sources = vec![SequenceSource::new("staff_members", "login_id")];

    let result = test_db.db.provisioning.provision(request).await;
    assert!(matches!(result, Err(Error::SchemaUnavailable(_))));

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_provision_rolls_back_on_rejection() {
    let test_db = TestDatabase::new().await;

    test_db
        .seed_user(SeedUser {
            email: Some("dup@example.com"),
            ..Default::default()
        })
        .await;

    let result = test_db
        .db
        .provisioning
        .provision(principal_request("dup@example.com"))
        .await;
    assert!(matches!(result, Err(Error::WriteRejected(_))));

    // The rejected insert left nothing behind.
    assert_eq!(test_db.count("users").await, 1);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_provision_batch_skips_rejected_records() {
    let test_db = TestDatabase::new().await;

    let requests = vec![
        principal_request("one@example.com"),
        principal_request("one@example.com"), // duplicate, skipped
        principal_request("three@example.com"),
    ];

    let outcome = test_db
        .db
        .provisioning
        .provision_batch(requests)
        .await
        .expect("Batch failed");

    assert_eq!(outcome.provisioned.len(), 2);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].index, 1);
    assert_eq!(outcome.provisioned[0].identifier, "PR-250001");
    assert_eq!(outcome.provisioned[1].identifier, "PR-250002");
    assert_eq!(test_db.count("users").await, 2);

    test_db.cleanup().await;
}

#[tokio::test]
async fn test_provision_without_identifier_column() {
    let test_db = TestDatabase::new().await;

    let user_id = test_db.seed_user(SeedUser::default()).await;

    // Target table lacks login_id entirely; the record is still written.
    let request = ProvisionRequest {
        table: "user_profiles".to_string(),
        key_column: "id".to_string(),
        identifier_column: "login_id".to_string(),
        prefix: "TR".to_string(),
        epoch: Some(25),
        sources: vec![SequenceSource::new("users", "login_id")],
        fields: vec![
            FieldCandidate::new("user_id", user_id),
            FieldCandidate::new("department", "Science"),
        ],
    };

    let outcome = test_db
        .db
        .provisioning
        .provision(request)
        .await
        .expect("Provision failed");
    assert_eq!(outcome.identifier, "TR-250001");
    assert_eq!(test_db.count("user_profiles").await, 1);

    test_db.cleanup().await;
}
