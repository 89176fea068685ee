use std::sync::Arc;

use axum::extract::State;

use crate::auth::CurrentUser;
use crate::backup::{self, ExportDocument, ImportReport};
use crate::db::AppState;
use crate::error::AppResult;
use crate::extract::Json;

pub async fn export_data(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
) -> AppResult<Json<ExportDocument>> {
  Ok(Json(backup::export_data(&state.db, user.id()).await?))
}

/// Rows land under the caller's account regardless of who exported them
pub async fn import_data(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Json(document): Json<ExportDocument>,
) -> AppResult<Json<ImportReport>> {
  Ok(Json(backup::import_data(&state.db, user.id(), &document).await?))
}
