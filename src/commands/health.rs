use std::sync::Arc;

use axum::extract::State;
use serde::Serialize;

use crate::db::AppState;
use crate::extract::Json;

#[derive(Debug, Serialize)]
pub struct Health {
  pub status: String,
  pub database: bool,
}

/// Liveness plus a trivial database round trip
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
  let database = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
  Json(Health {
    status: if database { "ok" } else { "degraded" }.to_string(),
    database,
  })
}
