//! Diet, consumption log and nutrition endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::db::AppState;
use crate::diet::{self, DietUpdate, MealInput, NewDiet};
use crate::error::AppResult;
use crate::extract::{Json, Path, Query};
use crate::models::{Diet, DietDetail, DietFoodConsumption};
use crate::nutrition::{DailyProgress, DietSummary};

/// `?date=YYYY-MM-DD`, today (UTC) when omitted
#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
  pub date: Option<NaiveDate>,
}

impl DateQuery {
  fn or_today(&self) -> NaiveDate {
    self.date.unwrap_or_else(|| Utc::now().date_naive())
  }
}

#[derive(Debug, Deserialize)]
pub struct ConsumptionToggle {
  pub food_id: i64,
  #[serde(default)]
  pub date: Option<NaiveDate>,
}

pub async fn list_diets(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
) -> AppResult<Json<Vec<Diet>>> {
  Ok(Json(diet::list_diets(&state.db, user.id()).await?))
}

pub async fn create_diet(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Json(new_diet): Json<NewDiet>,
) -> AppResult<(StatusCode, Json<DietDetail>)> {
  let detail = diet::create_diet(&state.db, user.id(), &new_diet).await?;
  Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_diet(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(diet_id): Path<i64>,
) -> AppResult<Json<DietDetail>> {
  Ok(Json(diet::load_diet_detail(&state.db, user.id(), diet_id).await?))
}

pub async fn update_diet(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(diet_id): Path<i64>,
  Json(update): Json<DietUpdate>,
) -> AppResult<Json<Diet>> {
  Ok(Json(diet::update_diet(&state.db, user.id(), diet_id, &update).await?))
}

pub async fn delete_diet(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(diet_id): Path<i64>,
) -> AppResult<StatusCode> {
  diet::delete_diet(&state.db, user.id(), diet_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn replace_meals(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(diet_id): Path<i64>,
  Json(meals): Json<Vec<MealInput>>,
) -> AppResult<Json<DietDetail>> {
  Ok(Json(
    diet::replace_meals(&state.db, user.id(), diet_id, &meals).await?,
  ))
}

pub async fn summary(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(diet_id): Path<i64>,
) -> AppResult<Json<DietSummary>> {
  Ok(Json(diet::diet_summary(&state.db, user.id(), diet_id).await?))
}

pub async fn progress(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(diet_id): Path<i64>,
  Query(query): Query<DateQuery>,
) -> AppResult<Json<DailyProgress>> {
  Ok(Json(
    diet::diet_progress(&state.db, user.id(), diet_id, query.or_today()).await?,
  ))
}

pub async fn consumption(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(diet_id): Path<i64>,
  Query(query): Query<DateQuery>,
) -> AppResult<Json<Vec<DietFoodConsumption>>> {
  Ok(Json(
    diet::consumption_for_date(&state.db, user.id(), diet_id, query.or_today()).await?,
  ))
}

pub async fn toggle_consumption(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(diet_id): Path<i64>,
  Json(toggle): Json<ConsumptionToggle>,
) -> AppResult<Json<DietFoodConsumption>> {
  let date = toggle.date.unwrap_or_else(|| Utc::now().date_naive());
  Ok(Json(
    diet::toggle_consumption(&state.db, user.id(), diet_id, toggle.food_id, date).await?,
  ))
}
