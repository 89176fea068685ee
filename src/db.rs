use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::AppResult;
use crate::mailer::Mailer;

pub type DbPool = SqlitePool;

/// Application state shared by every handler
pub struct AppState {
  pub db: DbPool,
  pub mailer: Mailer,
  pub session_ttl: chrono::Duration,
}

/// Initialize the database connection pool and run migrations
pub async fn initialize_db(database_url: &str, max_connections: u32) -> AppResult<DbPool> {
  info!(url = %database_url, max_connections, "Initializing database");

  let options = SqliteConnectOptions::from_str(database_url)?
    .create_if_missing(true)
    .foreign_keys(true);

  let pool = SqlitePoolOptions::new()
    .max_connections(max_connections)
    .acquire_timeout(Duration::from_secs(30))
    .connect_with(options)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  info!("Database initialized successfully");

  Ok(pool)
}
