//! Data access for the lodging workspace.
//!
//! - [`builder`] turns predicate maps into parameterized `SELECT`s.
//! - [`cache`] holds the cache backend trait and the cache-aside primitive.
//! - [`models`] and [`repositories`] hold row types and the cached stores.
//! - [`session`] scopes writes to a transaction.

use sqlx::postgres::PgPoolOptions;

pub mod builder;
pub mod cache;
pub mod error;
pub mod models;
pub mod repositories;
pub mod session;

pub use error::ModelError;
pub use session::{transact, Session, WriteConn, WriteExecutor};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the pool can reach the server.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
