//! Connection pool bootstrap and migration runner. Per-table queries live
//! alongside the subsystem that owns them (`state::db`, `ptx::db`).

use eyre::{Result, WrapErr};
use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .wrap_err("failed to connect to database")
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .wrap_err("failed to run database migrations")
}
