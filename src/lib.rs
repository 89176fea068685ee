pub mod auth;
pub mod backup;
pub mod commands;
pub mod config;
pub mod db;
pub mod diet;
pub mod error;
pub mod extract;
pub mod mailer;
pub mod models;
pub mod nutrition;
pub mod progress;
pub mod replication;
pub mod training;
pub mod weight;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use db::AppState;
use mailer::Mailer;

pub use error::{AppError, AppResult};

/// Load configuration, open the database and serve the HTTP API until shutdown
pub async fn run() -> AppResult<()> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = Config::from_env()?;
  let pool = db::initialize_db(&config.database_url, config.max_connections).await?;
  let mailer = Mailer::from_config(config.smtp.as_ref())?;

  let state = Arc::new(AppState {
    db: pool,
    mailer,
    session_ttl: config.session_ttl,
  });

  let app = commands::router()
    .layer(TraceLayer::new_for_http())
    .with_state(state);

  let listener = tokio::net::TcpListener::bind(config.addr)
    .await
    .map_err(|e| AppError::Internal(format!("Failed to bind {}: {}", config.addr, e)))?;
  info!(addr = %config.addr, "Fitness planner listening");

  axum::serve(listener, app)
    .await
    .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

  Ok(())
}
