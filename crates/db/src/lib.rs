//! PostgreSQL persistence for revwiki.
//!
//! [`PgRepository`] implements the core `PageRepository` contract on top of
//! the zero-sized query repos in [`repositories`].

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod pg_repository;
pub mod repositories;

pub use pg_repository::PgRepository;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
