//! Training plan queries and per-week logging
//!
//! Structural changes (creating a plan, editing its days/exercises or week
//! count) live in `replication`. Everything here touches a single row or a
//! single (exercise key, week) slot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{
  Exercise, ExerciseKey, ExerciseObservation, ExerciseSet, ProgressionType, TrainingDay,
  TrainingPlan, TrainingWeek,
};
use crate::replication::plan_keys;

// ---------------------------------------------------------------------------
/// Read models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DayDetail {
  #[serde(flatten)]
  pub day: TrainingDay,
  pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekDetail {
  #[serde(flatten)]
  pub week: TrainingWeek,
  pub days: Vec<DayDetail>,
}

/// A plan with all of its weeks, days and exercises
#[derive(Debug, Clone, Serialize)]
pub struct PlanDetail {
  #[serde(flatten)]
  pub plan: TrainingPlan,
  pub weeks: Vec<WeekDetail>,
}

/// An exercise row resolved together with the week it belongs to
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ResolvedExercise {
  pub plan_id: i64,
  pub week_number: i64,
  #[sqlx(flatten)]
  pub exercise: Exercise,
}

// ---------------------------------------------------------------------------
/// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanUpdate {
  pub name: Option<String>,
  /// `null` clears the description
  #[serde(default, deserialize_with = "crate::models::nullable")]
  pub description: Option<Option<String>>,
  pub start_date: Option<NaiveDate>,
}

/// Fields one week's copy of an exercise may override.
/// `null` clears `rpe`, `technique` and `technique_description`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExerciseUpdate {
  pub sets: Option<i64>,
  pub reps: Option<String>,
  #[serde(default, deserialize_with = "crate::models::nullable")]
  pub rpe: Option<Option<f64>>,
  pub progression_type: Option<ProgressionType>,
  #[serde(default, deserialize_with = "crate::models::nullable")]
  pub technique: Option<Option<String>>,
  #[serde(default, deserialize_with = "crate::models::nullable")]
  pub technique_description: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetInput {
  pub set_number: i64,
  #[serde(default)]
  pub weight: Option<f64>,
  #[serde(default)]
  pub reps: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservationInput {
  #[serde(default)]
  pub observations: String,
  #[serde(default)]
  pub is_completed: bool,
}

impl ExerciseUpdate {
  pub fn validate(&self) -> AppResult<()> {
    if matches!(self.sets, Some(sets) if sets < 1) {
      return Err(AppError::validation("sets must be at least 1"));
    }
    if matches!(&self.reps, Some(reps) if reps.trim().is_empty()) {
      return Err(AppError::validation("reps cannot be empty"));
    }
    if matches!(self.rpe, Some(Some(rpe)) if !(1.0..=10.0).contains(&rpe)) {
      return Err(AppError::validation("rpe must be between 1 and 10"));
    }
    Ok(())
  }
}

fn validate_sets(sets: &[SetInput]) -> AppResult<()> {
  let mut seen = std::collections::HashSet::new();
  for set in sets {
    if set.set_number < 1 {
      return Err(AppError::validation("set_number must be at least 1"));
    }
    if !seen.insert(set.set_number) {
      return Err(AppError::validation(format!(
        "set_number {} is repeated",
        set.set_number
      )));
    }
    if matches!(set.weight, Some(weight) if weight < 0.0) {
      return Err(AppError::validation("weight cannot be negative"));
    }
    if matches!(set.reps, Some(reps) if reps < 0) {
      return Err(AppError::validation("reps cannot be negative"));
    }
  }
  Ok(())
}

// ---------------------------------------------------------------------------
// Database Operations
// ---------------------------------------------------------------------------

const PLAN_COLUMNS: &str = "id, user_id, name, description, total_weeks, current_week, \
                            start_date, end_date, is_expired";

/// Fetch a plan owned by `user_id`
pub async fn get_plan(pool: &SqlitePool, user_id: i64, plan_id: i64) -> AppResult<TrainingPlan> {
  sqlx::query_as::<_, TrainingPlan>(&format!(
    "SELECT {} FROM training_plans WHERE id = ?1 AND user_id = ?2",
    PLAN_COLUMNS
  ))
  .bind(plan_id)
  .bind(user_id)
  .fetch_optional(pool)
  .await?
  .ok_or_else(|| AppError::not_found("TrainingPlan", plan_id))
}

/// Mark every plan whose end date has passed as expired
pub async fn refresh_expired_plans(pool: &SqlitePool, user_id: i64, today: NaiveDate) -> AppResult<u64> {
  let plans: Vec<(i64, NaiveDate, bool)> = sqlx::query_as(
    "SELECT id, end_date, is_expired FROM training_plans WHERE user_id = ?",
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  let mut changed = 0;
  for (plan_id, end_date, is_expired) in plans {
    let expired = TrainingPlan::is_expired_on(end_date, today);
    if expired == is_expired {
      continue;
    }
    sqlx::query("UPDATE training_plans SET is_expired = ? WHERE id = ?")
      .bind(expired)
      .bind(plan_id)
      .execute(pool)
      .await?;
    changed += 1;
  }

  if changed > 0 {
    info!(user_id, changed, "Refreshed plan expiration");
  }
  Ok(changed)
}

/// The user's plans, newest start date first, with expiration refreshed
pub async fn list_plans(pool: &SqlitePool, user_id: i64, today: NaiveDate) -> AppResult<Vec<TrainingPlan>> {
  refresh_expired_plans(pool, user_id, today).await?;

  let plans = sqlx::query_as::<_, TrainingPlan>(&format!(
    "SELECT {} FROM training_plans WHERE user_id = ? ORDER BY start_date DESC, id DESC",
    PLAN_COLUMNS
  ))
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  Ok(plans)
}

pub async fn get_plan_detail(pool: &SqlitePool, user_id: i64, plan_id: i64) -> AppResult<PlanDetail> {
  let plan = get_plan(pool, user_id, plan_id).await?;

  let weeks = sqlx::query_as::<_, TrainingWeek>(
    "SELECT id, plan_id, week_number, is_deload FROM training_weeks WHERE plan_id = ? ORDER BY week_number",
  )
  .bind(plan_id)
  .fetch_all(pool)
  .await?;

  let days = sqlx::query_as::<_, TrainingDay>(
    r#"
    SELECT d.id, d.week_id, d.day_number, d.name
    FROM training_days d
    JOIN training_weeks w ON w.id = d.week_id
    WHERE w.plan_id = ?
    ORDER BY d.day_number, d.id
    "#,
  )
  .bind(plan_id)
  .fetch_all(pool)
  .await?;

  let exercises = sqlx::query_as::<_, Exercise>(
    r#"
    SELECT e.id, e.day_id, e.exercise_key, e.name, e.sets, e.reps, e.rpe,
           e.progression_type, e.technique, e.technique_description, e.order_number
    FROM exercises e
    JOIN training_days d ON d.id = e.day_id
    JOIN training_weeks w ON w.id = d.week_id
    WHERE w.plan_id = ?
    ORDER BY e.order_number, e.id
    "#,
  )
  .bind(plan_id)
  .fetch_all(pool)
  .await?;

  let weeks = weeks
    .into_iter()
    .map(|week| WeekDetail {
      days: days
        .iter()
        .filter(|day| day.week_id == week.id)
        .map(|day| DayDetail {
          day: day.clone(),
          exercises: exercises
            .iter()
            .filter(|exercise| exercise.day_id == day.id)
            .cloned()
            .collect(),
        })
        .collect(),
      week,
    })
    .collect();

  Ok(PlanDetail { plan, weeks })
}

/// Update name, description or start date. A new start date moves the end date.
pub async fn update_plan(
  pool: &SqlitePool,
  user_id: i64,
  plan_id: i64,
  update: &PlanUpdate,
) -> AppResult<TrainingPlan> {
  if matches!(&update.name, Some(name) if name.trim().is_empty()) {
    return Err(AppError::validation("plan name is required"));
  }
  let plan = get_plan(pool, user_id, plan_id).await?;

  let name = update.name.as_deref().map(str::trim).unwrap_or(&plan.name);
  let description = update.description.clone().unwrap_or(plan.description.clone());
  let start_date = update.start_date.unwrap_or(plan.start_date);
  let end_date = TrainingPlan::compute_end_date(start_date, plan.total_weeks);
  let today = chrono::Utc::now().date_naive();

  sqlx::query(
    r#"
    UPDATE training_plans
    SET name = ?1, description = ?2, start_date = ?3, end_date = ?4, is_expired = ?5
    WHERE id = ?6
    "#,
  )
  .bind(name)
  .bind(&description)
  .bind(start_date)
  .bind(end_date)
  .bind(TrainingPlan::is_expired_on(end_date, today))
  .bind(plan_id)
  .execute(pool)
  .await?;

  get_plan(pool, user_id, plan_id).await
}

pub async fn set_current_week(
  pool: &SqlitePool,
  user_id: i64,
  plan_id: i64,
  week_number: i64,
) -> AppResult<TrainingPlan> {
  let plan = get_plan(pool, user_id, plan_id).await?;
  if !(1..=plan.total_weeks).contains(&week_number) {
    return Err(AppError::validation(format!(
      "week must be between 1 and {}",
      plan.total_weeks
    )));
  }

  sqlx::query("UPDATE training_plans SET current_week = ?1 WHERE id = ?2")
    .bind(week_number)
    .bind(plan_id)
    .execute(pool)
    .await?;

  get_plan(pool, user_id, plan_id).await
}

pub async fn set_deload(
  pool: &SqlitePool,
  user_id: i64,
  plan_id: i64,
  week_number: i64,
  is_deload: bool,
) -> AppResult<()> {
  get_plan(pool, user_id, plan_id).await?;

  let result = sqlx::query(
    "UPDATE training_weeks SET is_deload = ?1 WHERE plan_id = ?2 AND week_number = ?3",
  )
  .bind(is_deload)
  .bind(plan_id)
  .bind(week_number)
  .execute(pool)
  .await?;

  if result.rows_affected() == 0 {
    return Err(AppError::not_found("TrainingWeek", week_number));
  }
  Ok(())
}

/// Delete a plan with its weeks, days, exercises and every log of its keys
pub async fn delete_plan(pool: &SqlitePool, user_id: i64, plan_id: i64) -> AppResult<()> {
  get_plan(pool, user_id, plan_id).await?;

  for key in plan_keys(pool, plan_id).await? {
    sqlx::query("DELETE FROM exercise_sets WHERE user_id = ?1 AND exercise_key = ?2")
      .bind(user_id)
      .bind(&key)
      .execute(pool)
      .await?;
    sqlx::query("DELETE FROM exercise_observations WHERE user_id = ?1 AND exercise_key = ?2")
      .bind(user_id)
      .bind(&key)
      .execute(pool)
      .await?;
  }

  sqlx::query("DELETE FROM training_plans WHERE id = ?")
    .bind(plan_id)
    .execute(pool)
    .await?;

  info!(plan_id, user_id, "Deleted training plan");
  Ok(())
}

/// Resolve an exercise row id to its key and week, checking ownership.
///
/// Row ids are regenerated by every structural edit, so a stale id fails
/// here with `NotFound` instead of reaching another exercise's logs.
pub async fn resolve_exercise(
  pool: &SqlitePool,
  user_id: i64,
  exercise_id: i64,
) -> AppResult<ResolvedExercise> {
  sqlx::query_as::<_, ResolvedExercise>(
    r#"
    SELECT w.plan_id, w.week_number,
           e.id, e.day_id, e.exercise_key, e.name, e.sets, e.reps, e.rpe,
           e.progression_type, e.technique, e.technique_description, e.order_number
    FROM exercises e
    JOIN training_days d ON d.id = e.day_id
    JOIN training_weeks w ON w.id = d.week_id
    JOIN training_plans p ON p.id = w.plan_id
    WHERE e.id = ?1 AND p.user_id = ?2
    "#,
  )
  .bind(exercise_id)
  .bind(user_id)
  .fetch_optional(pool)
  .await?
  .ok_or_else(|| AppError::not_found("Exercise", exercise_id))
}

/// Change one week's copy of an exercise; other weeks are untouched
pub async fn update_exercise(
  pool: &SqlitePool,
  user_id: i64,
  exercise_id: i64,
  update: &ExerciseUpdate,
) -> AppResult<Exercise> {
  update.validate()?;
  let current = resolve_exercise(pool, user_id, exercise_id).await?.exercise;

  sqlx::query(
    r#"
    UPDATE exercises
    SET sets = ?1, reps = ?2, rpe = ?3, progression_type = ?4,
        technique = ?5, technique_description = ?6
    WHERE id = ?7
    "#,
  )
  .bind(update.sets.unwrap_or(current.sets))
  .bind(update.reps.as_deref().map(str::trim).unwrap_or(&current.reps))
  .bind(update.rpe.unwrap_or(current.rpe))
  .bind(update.progression_type.unwrap_or(current.progression_type))
  .bind(update.technique.clone().unwrap_or(current.technique))
  .bind(update.technique_description.clone().unwrap_or(current.technique_description))
  .bind(exercise_id)
  .execute(pool)
  .await?;

  Ok(resolve_exercise(pool, user_id, exercise_id).await?.exercise)
}

async fn sets_for(
  pool: &SqlitePool,
  user_id: i64,
  key: &ExerciseKey,
  week_number: i64,
) -> AppResult<Vec<ExerciseSet>> {
  let sets = sqlx::query_as::<_, ExerciseSet>(
    r#"
    SELECT id, user_id, exercise_key, week_number, set_number, weight, reps
    FROM exercise_sets
    WHERE user_id = ?1 AND exercise_key = ?2 AND week_number = ?3
    ORDER BY set_number
    "#,
  )
  .bind(user_id)
  .bind(key)
  .bind(week_number)
  .fetch_all(pool)
  .await?;
  Ok(sets)
}

/// Sets logged for the exercise in the week its row belongs to
pub async fn get_sets(pool: &SqlitePool, user_id: i64, exercise_id: i64) -> AppResult<Vec<ExerciseSet>> {
  let resolved = resolve_exercise(pool, user_id, exercise_id).await?;
  sets_for(pool, user_id, &resolved.exercise.exercise_key, resolved.week_number).await
}

/// Replace every set logged for the exercise in the row's week
pub async fn save_sets(
  pool: &SqlitePool,
  user_id: i64,
  exercise_id: i64,
  sets: &[SetInput],
) -> AppResult<Vec<ExerciseSet>> {
  validate_sets(sets)?;
  let resolved = resolve_exercise(pool, user_id, exercise_id).await?;
  let key = &resolved.exercise.exercise_key;

  sqlx::query("DELETE FROM exercise_sets WHERE user_id = ?1 AND exercise_key = ?2 AND week_number = ?3")
    .bind(user_id)
    .bind(key)
    .bind(resolved.week_number)
    .execute(pool)
    .await?;

  for set in sets {
    sqlx::query(
      r#"
      INSERT INTO exercise_sets (user_id, exercise_key, week_number, set_number, weight, reps)
      VALUES (?1, ?2, ?3, ?4, ?5, ?6)
      "#,
    )
    .bind(user_id)
    .bind(key)
    .bind(resolved.week_number)
    .bind(set.set_number)
    .bind(set.weight)
    .bind(set.reps)
    .execute(pool)
    .await?;
  }

  info!(
    user_id,
    exercise_key = %key,
    week = resolved.week_number,
    sets = sets.len(),
    "Logged sets"
  );
  sets_for(pool, user_id, key, resolved.week_number).await
}

pub async fn get_observation(
  pool: &SqlitePool,
  user_id: i64,
  exercise_id: i64,
) -> AppResult<Option<ExerciseObservation>> {
  let resolved = resolve_exercise(pool, user_id, exercise_id).await?;

  let observation = sqlx::query_as::<_, ExerciseObservation>(
    r#"
    SELECT id, user_id, exercise_key, week_number, observations, is_completed
    FROM exercise_observations
    WHERE user_id = ?1 AND exercise_key = ?2 AND week_number = ?3
    "#,
  )
  .bind(user_id)
  .bind(&resolved.exercise.exercise_key)
  .bind(resolved.week_number)
  .fetch_optional(pool)
  .await?;

  Ok(observation)
}

/// Insert or replace the observation for the exercise in the row's week
pub async fn save_observation(
  pool: &SqlitePool,
  user_id: i64,
  exercise_id: i64,
  input: &ObservationInput,
) -> AppResult<ExerciseObservation> {
  let resolved = resolve_exercise(pool, user_id, exercise_id).await?;

  sqlx::query(
    r#"
    INSERT INTO exercise_observations (user_id, exercise_key, week_number, observations, is_completed)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(user_id, exercise_key, week_number) DO UPDATE SET
      observations = excluded.observations,
      is_completed = excluded.is_completed
    "#,
  )
  .bind(user_id)
  .bind(&resolved.exercise.exercise_key)
  .bind(resolved.week_number)
  .bind(input.observations.trim())
  .bind(input.is_completed)
  .execute(pool)
  .await?;

  get_observation(pool, user_id, exercise_id)
    .await?
    .ok_or_else(|| AppError::Internal("observation missing after upsert".to_string()))
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
