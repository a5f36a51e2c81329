//! Individual database operations

use crate::vision::{Descriptor, DescriptorStrategy};
use chrono::NaiveDate;
use sightid_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

/// Individual record
#[derive(Debug, Clone)]
pub struct Individual {
    pub id: i64,
    pub name: String,
    pub reference_photo: Vec<u8>,
    /// Serialized reference descriptor (JSON, tagged by strategy)
    pub descriptor: String,
    pub descriptor_strategy: String,
    pub first_seen: NaiveDate,
    pub created_at: String,
}

/// Catalog listing row (no photo payload)
#[derive(Debug, Clone, PartialEq)]
pub struct IndividualSummary {
    pub id: i64,
    pub name: String,
    pub first_seen: NaiveDate,
    pub sighting_count: i64,
}

/// Reference material the identity resolver scores against
#[derive(Debug, Clone)]
pub struct CatalogReference {
    pub individual_id: i64,
    /// Absent when the catalog scan skipped it (cache already current)
    pub reference_photo: Option<Vec<u8>>,
    pub descriptor: String,
    pub descriptor_strategy: String,
}

/// Values for a newly recognized individual
#[derive(Debug)]
pub struct NewIndividual<'a> {
    pub name: &'a str,
    pub reference_photo: &'a [u8],
    pub descriptor: &'a Descriptor,
    pub first_seen: NaiveDate,
}

/// Insert an individual and return its generated id
pub async fn insert_individual(conn: &mut SqliteConnection, new: &NewIndividual<'_>) -> Result<i64> {
    let descriptor = new
        .descriptor
        .to_json()
        .map_err(|e| Error::Internal(format!("Descriptor not serializable: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT INTO individuals (
            name, reference_photo, descriptor, descriptor_strategy, first_seen, created_at
        ) VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(new.name)
    .bind(new.reference_photo)
    .bind(descriptor)
    .bind(new.descriptor.strategy().as_str())
    .bind(new.first_seen)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

fn individual_from_row(row: &SqliteRow) -> Individual {
    Individual {
        id: row.get("id"),
        name: row.get("name"),
        reference_photo: row.get("reference_photo"),
        descriptor: row.get("descriptor"),
        descriptor_strategy: row.get("descriptor_strategy"),
        first_seen: row.get("first_seen"),
        created_at: row.get("created_at"),
    }
}

/// Load individual by id
pub async fn load_individual(conn: &mut SqliteConnection, id: i64) -> Result<Option<Individual>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, reference_photo, descriptor, descriptor_strategy, first_seen, created_at
        FROM individuals
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(individual_from_row))
}

/// Name of an individual, or `NotFound`
pub async fn individual_name(conn: &mut SqliteConnection, id: i64) -> Result<String> {
    let name: Option<String> = sqlx::query_scalar("SELECT name FROM individuals WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    name.ok_or_else(|| Error::NotFound(format!("individual {}", id)))
}

/// List the catalog ordered by id, with sighting counts
pub async fn list_individuals(conn: &mut SqliteConnection) -> Result<Vec<IndividualSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT i.id, i.name, i.first_seen, COUNT(s.id) AS sighting_count
        FROM individuals i
        LEFT JOIN sightings s ON s.individual_id = i.id
        GROUP BY i.id
        ORDER BY i.id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| IndividualSummary {
            id: row.get("id"),
            name: row.get("name"),
            first_seen: row.get("first_seen"),
            sighting_count: row.get("sighting_count"),
        })
        .collect())
}

/// Every individual's cached descriptor, ordered by id
///
/// The reference photo is loaded only for rows cached under a strategy
/// other than `active`, since those must be recomputed.
pub async fn load_catalog_references(
    conn: &mut SqliteConnection,
    active: DescriptorStrategy,
) -> Result<Vec<CatalogReference>> {
    let rows = sqlx::query(
        r#"
        SELECT id, descriptor, descriptor_strategy,
               CASE WHEN descriptor_strategy = ? THEN NULL ELSE reference_photo END AS reference_photo
        FROM individuals
        ORDER BY id
        "#,
    )
    .bind(active.as_str())
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(reference_from_row).collect())
}

/// One individual's reference material including the photo
pub async fn load_reference(conn: &mut SqliteConnection, id: i64) -> Result<CatalogReference> {
    let row = sqlx::query(
        r#"
        SELECT id, descriptor, descriptor_strategy, reference_photo
        FROM individuals
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref()
        .map(reference_from_row)
        .ok_or_else(|| Error::NotFound(format!("individual {}", id)))
}

fn reference_from_row(row: &SqliteRow) -> CatalogReference {
    CatalogReference {
        individual_id: row.get("id"),
        reference_photo: row.get("reference_photo"),
        descriptor: row.get("descriptor"),
        descriptor_strategy: row.get("descriptor_strategy"),
    }
}

/// Number of individuals in the catalog
pub async fn count_individuals(conn: &mut SqliteConnection) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM individuals")
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}
