use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;

use crate::auth::CurrentUser;
use crate::db::AppState;
use crate::error::AppResult;
use crate::extract::{Json, Path};
use crate::models::{NewWeightEntry, WeightEntry};
use crate::weight::{self, WeightTrend};

pub async fn list_entries(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
) -> AppResult<Json<Vec<WeightEntry>>> {
  Ok(Json(weight::list_entries(&state.db, user.id()).await?))
}

pub async fn add_entry(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Json(entry): Json<NewWeightEntry>,
) -> AppResult<(StatusCode, Json<WeightEntry>)> {
  let saved = weight::add_entry(&state.db, user.id(), &entry).await?;
  Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn delete_entry(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(entry_id): Path<i64>,
) -> AppResult<StatusCode> {
  weight::delete_entry(&state.db, user.id(), entry_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `null` while the log is empty
pub async fn trend(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
) -> AppResult<Json<Option<WeightTrend>>> {
  Ok(Json(weight::trend(&state.db, user.id()).await?))
}
