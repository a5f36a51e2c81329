//! Sighting database operations

use chrono::NaiveDate;
use sightid_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

/// Sighting record
#[derive(Debug, Clone)]
pub struct Sighting {
    pub id: i64,
    pub individual_id: i64,
    pub photo_body: Vec<u8>,
    pub photo_head: Vec<u8>,
    pub latitude: f64,
    pub longitude: f64,
    pub state: String,
    pub city: String,
    pub observed_on: NaiveDate,
    pub matched_existing: bool,
    pub match_score: Option<f64>,
    pub created_at: String,
}

/// Values for a new sighting
#[derive(Debug)]
pub struct NewSighting<'a> {
    pub individual_id: i64,
    pub photo_body: &'a [u8],
    pub photo_head: &'a [u8],
    pub latitude: f64,
    pub longitude: f64,
    pub state: &'a str,
    pub city: &'a str,
    pub observed_on: NaiveDate,
    pub matched_existing: bool,
    pub match_score: Option<f64>,
}

/// Insert a sighting and return its generated id
///
/// Fails with a foreign key violation when `individual_id` does not exist.
pub async fn insert_sighting(conn: &mut SqliteConnection, new: &NewSighting<'_>) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO sightings (
            individual_id, photo_body, photo_head, latitude, longitude,
            state, city, observed_on, matched_existing, match_score, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(new.individual_id)
    .bind(new.photo_body)
    .bind(new.photo_head)
    .bind(new.latitude)
    .bind(new.longitude)
    .bind(new.state)
    .bind(new.city)
    .bind(new.observed_on)
    .bind(new.matched_existing)
    .bind(new.match_score)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

fn sighting_from_row(row: &SqliteRow) -> Sighting {
    Sighting {
        id: row.get("id"),
        individual_id: row.get("individual_id"),
        photo_body: row.get("photo_body"),
        photo_head: row.get("photo_head"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        state: row.get("state"),
        city: row.get("city"),
        observed_on: row.get("observed_on"),
        matched_existing: row.get("matched_existing"),
        match_score: row.get("match_score"),
        created_at: row.get("created_at"),
    }
}

const SIGHTING_COLUMNS: &str = "id, individual_id, photo_body, photo_head, latitude, longitude, \
     state, city, observed_on, matched_existing, match_score, created_at";

/// Load sighting by id
pub async fn load_sighting(conn: &mut SqliteConnection, id: i64) -> Result<Option<Sighting>> {
    let row = sqlx::query(&format!("SELECT {} FROM sightings WHERE id = ?", SIGHTING_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.as_ref().map(sighting_from_row))
}

/// All sightings of one individual, oldest first
pub async fn list_sightings_for(
    conn: &mut SqliteConnection,
    individual_id: i64,
) -> Result<Vec<Sighting>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sightings WHERE individual_id = ? ORDER BY id",
        SIGHTING_COLUMNS
    ))
    .bind(individual_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.iter().map(sighting_from_row).collect())
}
