//! Tests for database initialization
//!
//! Covers automatic creation, idempotent reopen, schema shape and the
//! foreign key between sightings and individuals.

use sightid_common::db::init_database;
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("catalog.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");

    let pool1 = init_database(&db_path).await.expect("first open");
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_catalog_tables_created() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("catalog.db")).await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(tables, vec!["individuals".to_string(), "sightings".to_string()]);
}

#[tokio::test]
async fn test_sighting_requires_existing_individual() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("catalog.db")).await.unwrap();

    let result = sqlx::query(
        r#"
        INSERT INTO sightings (individual_id, photo_body, photo_head, latitude, longitude,
                               state, city, observed_on)
        VALUES (999, x'00', x'00', 0.0, 0.0, 'a', 'b', '2024-01-01')
        "#,
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "Orphan sighting must violate the foreign key");
}
