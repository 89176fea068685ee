//! Training plan, exercise log and progress endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::db::AppState;
use crate::error::AppResult;
use crate::extract::{Json, Path};
use crate::models::{Exercise, ExerciseObservation, ExerciseSet, TrainingPlan};
use crate::progress::{self, ExerciseProgress};
use crate::replication::{self, NewPlan, StructureEdit};
use crate::training::{
  self, ExerciseUpdate, ObservationInput, PlanDetail, PlanUpdate, SetInput,
};

#[derive(Debug, Deserialize)]
pub struct CurrentWeek {
  pub week: i64,
}

#[derive(Debug, Deserialize)]
pub struct DeloadToggle {
  pub is_deload: bool,
}

pub async fn list_plans(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
) -> AppResult<Json<Vec<TrainingPlan>>> {
  let today = Utc::now().date_naive();
  Ok(Json(training::list_plans(&state.db, user.id(), today).await?))
}

pub async fn create_plan(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Json(new_plan): Json<NewPlan>,
) -> AppResult<(StatusCode, Json<PlanDetail>)> {
  let plan_id = replication::create_plan(&state.db, user.id(), &new_plan).await?;
  let detail = training::get_plan_detail(&state.db, user.id(), plan_id).await?;
  Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_plan(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(plan_id): Path<i64>,
) -> AppResult<Json<PlanDetail>> {
  Ok(Json(training::get_plan_detail(&state.db, user.id(), plan_id).await?))
}

pub async fn update_plan(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(plan_id): Path<i64>,
  Json(update): Json<PlanUpdate>,
) -> AppResult<Json<TrainingPlan>> {
  Ok(Json(training::update_plan(&state.db, user.id(), plan_id, &update).await?))
}

pub async fn delete_plan(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(plan_id): Path<i64>,
) -> AppResult<StatusCode> {
  training::delete_plan(&state.db, user.id(), plan_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// Replace days/exercises (and optionally the week count), then replicate
pub async fn edit_structure(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(plan_id): Path<i64>,
  Json(edit): Json<StructureEdit>,
) -> AppResult<Json<PlanDetail>> {
  replication::edit_structure(&state.db, user.id(), plan_id, &edit).await?;
  Ok(Json(training::get_plan_detail(&state.db, user.id(), plan_id).await?))
}

pub async fn set_current_week(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(plan_id): Path<i64>,
  Json(body): Json<CurrentWeek>,
) -> AppResult<Json<TrainingPlan>> {
  Ok(Json(
    training::set_current_week(&state.db, user.id(), plan_id, body.week).await?,
  ))
}

pub async fn set_deload(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path((plan_id, week_number)): Path<(i64, i64)>,
  Json(body): Json<DeloadToggle>,
) -> AppResult<StatusCode> {
  training::set_deload(&state.db, user.id(), plan_id, week_number, body.is_deload).await?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn update_exercise(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(exercise_id): Path<i64>,
  Json(update): Json<ExerciseUpdate>,
) -> AppResult<Json<Exercise>> {
  Ok(Json(
    training::update_exercise(&state.db, user.id(), exercise_id, &update).await?,
  ))
}

pub async fn get_sets(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(exercise_id): Path<i64>,
) -> AppResult<Json<Vec<ExerciseSet>>> {
  Ok(Json(training::get_sets(&state.db, user.id(), exercise_id).await?))
}

pub async fn save_sets(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(exercise_id): Path<i64>,
  Json(sets): Json<Vec<SetInput>>,
) -> AppResult<Json<Vec<ExerciseSet>>> {
  Ok(Json(
    training::save_sets(&state.db, user.id(), exercise_id, &sets).await?,
  ))
}

pub async fn get_observation(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(exercise_id): Path<i64>,
) -> AppResult<Json<Option<ExerciseObservation>>> {
  Ok(Json(
    training::get_observation(&state.db, user.id(), exercise_id).await?,
  ))
}

pub async fn save_observation(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(exercise_id): Path<i64>,
  Json(input): Json<ObservationInput>,
) -> AppResult<Json<ExerciseObservation>> {
  Ok(Json(
    training::save_observation(&state.db, user.id(), exercise_id, &input).await?,
  ))
}

pub async fn exercise_progress(
  State(state): State<Arc<AppState>>,
  user: CurrentUser,
  Path(exercise_id): Path<i64>,
) -> AppResult<Json<ExerciseProgress>> {
  Ok(Json(
    progress::exercise_progress(&state.db, user.id(), exercise_id).await?,
  ))
}
