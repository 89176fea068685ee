//! Account and session endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{
  self, CurrentUser, NewAccount, SessionContext, SessionEvent, SessionGrant, SessionState,
};
use crate::db::AppState;
use crate::error::AppResult;
use crate::extract::Json;
use crate::models::Profile;

#[derive(Debug, Deserialize)]
pub struct Credentials {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
  pub current_password: String,
  pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
  pub email: String,
}

pub async fn sign_up(
  State(state): State<Arc<AppState>>,
  Json(account): Json<NewAccount>,
) -> AppResult<(StatusCode, Json<Profile>)> {
  let profile = auth::sign_up(&state.db, &account).await?;
  Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn sign_in(
  State(state): State<Arc<AppState>>,
  Json(credentials): Json<Credentials>,
) -> AppResult<Json<SessionGrant>> {
  let grant = auth::sign_in(
    &state.db,
    &credentials.email,
    &credentials.password,
    state.session_ttl,
  )
  .await?;
  Ok(Json(grant))
}

/// Ends the session behind the bearer token, if any
pub async fn sign_out(
  State(state): State<Arc<AppState>>,
  mut context: SessionContext,
) -> AppResult<Json<SessionState>> {
  if let Some(token) = &context.token {
    auth::sign_out(&state.db, token).await?;
  }
  context.apply(SessionEvent::SignedOut);
  Ok(Json(context.state))
}

/// Resolved session state; never fails for a missing or expired token
pub async fn current_session(context: SessionContext) -> Json<SessionState> {
  Json(context.state)
}

pub async fn profile(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
) -> AppResult<Json<Profile>> {
  Ok(Json(auth::get_profile(&state.db, user.id()).await?))
}

pub async fn change_password(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Json(change): Json<PasswordChange>,
) -> AppResult<StatusCode> {
  auth::change_password(
    &state.db,
    user.id(),
    &change.current_password,
    &change.new_password,
  )
  .await?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_password(
  State(state): State<Arc<AppState>>,
  Json(request): Json<ResetRequest>,
) -> AppResult<Json<Value>> {
  auth::reset_password(&state.db, &state.mailer, &request.email).await?;
  Ok(Json(json!({ "success": true })))
}
