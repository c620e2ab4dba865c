use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to the Postgres instance that backs the room store
pub async fn connect_room_store(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("connecting to the room store database")?;

    tracing::info!(max_connections, "Room store pool ready");
    Ok(pool)
}

/// Create or upgrade the `rooms` table
pub async fn migrate_room_store(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("migrating the rooms table")?;
    tracing::info!("Room store schema up to date");
    Ok(())
}
