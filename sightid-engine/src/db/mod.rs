//! Catalog persistence
//!
//! Query functions take a `&mut SqliteConnection` so the same code runs
//! against a pooled connection or inside a [`TransactionContext`].
//!
//! [`TransactionContext`]: crate::utils::pool_monitor::TransactionContext

pub mod individuals;
pub mod sightings;

#[cfg(test)]
pub(crate) async fn memory_pool() -> sqlx::SqlitePool {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    // Single connection: every `:memory:` connection is its own database
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to create in-memory database");

    sightid_common::db::create_schema(&pool).await.unwrap();
    pool
}
