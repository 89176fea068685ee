//! Training plan replication
//!
//! A plan's first week is the template. Creating a plan stamps the template
//! onto every week; a structural edit rewrites week 1 and then regenerates the
//! days/exercises of every other week from it.
//!
//! Two identifiers exist per exercise:
//! - `ExerciseKey`: durable, shared by the same exercise in every week
//! - `exercises.id`: row id, recreated on every replication
//!
//! Per-week logs are keyed by (`ExerciseKey`, week number) so they survive
//! replication. Each week keeps its own sets/reps/rpe/progression values for
//! exercises that already existed there.
//!
//! Statements run one after another without a transaction: the first failure
//! aborts the remaining steps and completed steps stay in place.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{ExerciseKey, ProgressionType, TrainingPlan};
use crate::training::get_plan;

pub const MAX_WEEKS: i64 = 52;

// ---------------------------------------------------------------------------
/// Template input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseTemplate {
  /// Stable key; omitted for exercises new to the plan
  #[serde(default)]
  pub key: Option<ExerciseKey>,
  pub name: String,
  pub sets: i64,
  pub reps: String,
  #[serde(default)]
  pub rpe: Option<f64>,
  #[serde(default)]
  pub progression_type: ProgressionType,
  #[serde(default)]
  pub technique: Option<String>,
  #[serde(default)]
  pub technique_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayTemplate {
  pub day_number: i64,
  pub name: String,
  #[serde(default)]
  pub exercises: Vec<ExerciseTemplate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlan {
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  pub total_weeks: i64,
  pub start_date: NaiveDate,
  pub days: Vec<DayTemplate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructureEdit {
  /// New week count; unchanged when omitted
  #[serde(default)]
  pub total_weeks: Option<i64>,
  pub days: Vec<DayTemplate>,
}

fn validate_weeks(total_weeks: i64) -> AppResult<()> {
  if !(1..=MAX_WEEKS).contains(&total_weeks) {
    return Err(AppError::validation(format!(
      "total_weeks must be between 1 and {}",
      MAX_WEEKS
    )));
  }
  Ok(())
}

fn validate_days(days: &[DayTemplate]) -> AppResult<()> {
  let mut day_numbers = HashSet::new();
  let mut keys = HashSet::new();

  for day in days {
    if day.day_number < 1 {
      return Err(AppError::validation("day_number must be at least 1"));
    }
    if !day_numbers.insert(day.day_number) {
      return Err(AppError::validation(format!(
        "day_number {} is repeated",
        day.day_number
      )));
    }
    if day.name.trim().is_empty() {
      return Err(AppError::validation("day name is required"));
    }
    for exercise in &day.exercises {
      if exercise.name.trim().is_empty() {
        return Err(AppError::validation("exercise name is required"));
      }
      if exercise.sets < 1 {
        return Err(AppError::validation("exercise sets must be at least 1"));
      }
      if exercise.reps.trim().is_empty() {
        return Err(AppError::validation("exercise reps are required"));
      }
      if let Some(rpe) = exercise.rpe {
        if !(1.0..=10.0).contains(&rpe) {
          return Err(AppError::validation("rpe must be between 1 and 10"));
        }
      }
      if let Some(key) = &exercise.key {
        if key.as_str().trim().is_empty() {
          return Err(AppError::validation("exercise key must not be blank"));
        }
        if !keys.insert(key.clone()) {
          return Err(AppError::validation(format!("exercise key {} is repeated", key)));
        }
      }
    }
  }
  Ok(())
}

impl NewPlan {
  pub fn validate(&self) -> AppResult<()> {
    if self.name.trim().is_empty() {
      return Err(AppError::validation("plan name is required"));
    }
    validate_weeks(self.total_weeks)?;
    validate_days(&self.days)
  }
}

impl StructureEdit {
  pub fn validate(&self) -> AppResult<()> {
    if let Some(total_weeks) = self.total_weeks {
      validate_weeks(total_weeks)?;
    }
    validate_days(&self.days)
  }
}

// ---------------------------------------------------------------------------
/// Keyed template and per-week values
// ---------------------------------------------------------------------------

/// The fields each week may hold its own value for
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WeekFields {
  pub sets: i64,
  pub reps: String,
  pub rpe: Option<f64>,
  pub progression_type: ProgressionType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyedExercise {
  pub key: ExerciseKey,
  pub name: String,
  pub fields: WeekFields,
  pub technique: Option<String>,
  pub technique_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyedDay {
  pub day_number: i64,
  pub name: String,
  pub exercises: Vec<KeyedExercise>,
}

/// Give every template exercise a key, generating one where none was supplied.
/// Days come out ordered by `day_number`.
pub fn assign_keys(days: &[DayTemplate]) -> Vec<KeyedDay> {
  let mut keyed: Vec<KeyedDay> = days
    .iter()
    .map(|day| KeyedDay {
      day_number: day.day_number,
      name: day.name.trim().to_string(),
      exercises: day
        .exercises
        .iter()
        .map(|exercise| KeyedExercise {
          key: exercise.key.clone().unwrap_or_else(ExerciseKey::generate),
          name: exercise.name.trim().to_string(),
          fields: WeekFields {
            sets: exercise.sets,
            reps: exercise.reps.trim().to_string(),
            rpe: exercise.rpe,
            progression_type: exercise.progression_type,
          },
          technique: exercise.technique.clone(),
          technique_description: exercise.technique_description.clone(),
        })
        .collect(),
    })
    .collect();
  keyed.sort_by_key(|day| day.day_number);
  keyed
}

/// Structure for one week: the template, with this week's prior values kept
/// for every exercise that already existed in the week
pub fn replicate_week(template: &[KeyedDay], prior: &HashMap<ExerciseKey, WeekFields>) -> Vec<KeyedDay> {
  template
    .iter()
    .map(|day| KeyedDay {
      day_number: day.day_number,
      name: day.name.clone(),
      exercises: day
        .exercises
        .iter()
        .map(|exercise| KeyedExercise {
          fields: prior
            .get(&exercise.key)
            .cloned()
            .unwrap_or_else(|| exercise.fields.clone()),
          ..exercise.clone()
        })
        .collect(),
    })
    .collect()
}

pub fn template_keys(template: &[KeyedDay]) -> HashSet<ExerciseKey> {
  template
    .iter()
    .flat_map(|day| day.exercises.iter().map(|exercise| exercise.key.clone()))
    .collect()
}

// ---------------------------------------------------------------------------
// Database Operations
// ---------------------------------------------------------------------------

async fn insert_week(pool: &SqlitePool, plan_id: i64, week_number: i64) -> AppResult<i64> {
  let result = sqlx::query(
    "INSERT INTO training_weeks (plan_id, week_number, is_deload) VALUES (?1, ?2, 0)",
  )
  .bind(plan_id)
  .bind(week_number)
  .execute(pool)
  .await?;
  Ok(result.last_insert_rowid())
}

/// Insert days and exercises for a week, creating fresh row ids
async fn insert_week_structure(pool: &SqlitePool, week_id: i64, days: &[KeyedDay]) -> AppResult<()> {
  for day in days {
    let day_id = sqlx::query(
      "INSERT INTO training_days (week_id, day_number, name) VALUES (?1, ?2, ?3)",
    )
    .bind(week_id)
    .bind(day.day_number)
    .bind(&day.name)
    .execute(pool)
    .await?
    .last_insert_rowid();

    for (order, exercise) in day.exercises.iter().enumerate() {
      sqlx::query(
        r#"
        INSERT INTO exercises (
          day_id, exercise_key, name, sets, reps, rpe, progression_type,
          technique, technique_description, order_number
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
      )
      .bind(day_id)
      .bind(&exercise.key)
      .bind(&exercise.name)
      .bind(exercise.fields.sets)
      .bind(&exercise.fields.reps)
      .bind(exercise.fields.rpe)
      .bind(exercise.fields.progression_type)
      .bind(&exercise.technique)
      .bind(&exercise.technique_description)
      .bind(order as i64 + 1)
      .execute(pool)
      .await?;
    }
  }
  Ok(())
}

/// Keys referenced by any exercise in the plan
pub async fn plan_keys(pool: &SqlitePool, plan_id: i64) -> AppResult<HashSet<ExerciseKey>> {
  let keys: Vec<ExerciseKey> = sqlx::query_scalar(
    r#"
    SELECT DISTINCT e.exercise_key
    FROM exercises e
    JOIN training_days d ON d.id = e.day_id
    JOIN training_weeks w ON w.id = d.week_id
    WHERE w.plan_id = ?
    "#,
  )
  .bind(plan_id)
  .fetch_all(pool)
  .await?;
  Ok(keys.into_iter().collect())
}

/// Reject caller-supplied keys that already belong to another plan of the user
async fn ensure_keys_available(
  pool: &SqlitePool,
  user_id: i64,
  plan_id: Option<i64>,
  template: &[KeyedDay],
) -> AppResult<()> {
  for key in template_keys(template) {
    let owner: Option<i64> = sqlx::query_scalar(
      r#"
      SELECT w.plan_id
      FROM exercises e
      JOIN training_days d ON d.id = e.day_id
      JOIN training_weeks w ON w.id = d.week_id
      JOIN training_plans p ON p.id = w.plan_id
      WHERE p.user_id = ?1 AND e.exercise_key = ?2
      LIMIT 1
      "#,
    )
    .bind(user_id)
    .bind(&key)
    .fetch_optional(pool)
    .await?;

    if let Some(owner) = owner {
      if Some(owner) != plan_id {
        return Err(AppError::validation(format!(
          "exercise key {} belongs to another plan",
          key
        )));
      }
    }
  }
  Ok(())
}

/// Delete sets and observations for `keys` in weeks after `after_week`
/// (all weeks when `after_week` is 0)
async fn delete_logs(
  pool: &SqlitePool,
  user_id: i64,
  keys: &HashSet<ExerciseKey>,
  after_week: i64,
) -> AppResult<()> {
  for key in keys {
    sqlx::query(
      "DELETE FROM exercise_sets WHERE user_id = ?1 AND exercise_key = ?2 AND week_number > ?3",
    )
    .bind(user_id)
    .bind(key)
    .bind(after_week)
    .execute(pool)
    .await?;

    sqlx::query(
      "DELETE FROM exercise_observations WHERE user_id = ?1 AND exercise_key = ?2 AND week_number > ?3",
    )
    .bind(user_id)
    .bind(key)
    .bind(after_week)
    .execute(pool)
    .await?;
  }
  Ok(())
}

/// Remove every week after `new_total`, with their days, exercises and logs
async fn truncate_weeks(
  pool: &SqlitePool,
  user_id: i64,
  plan_id: i64,
  new_total: i64,
) -> AppResult<()> {
  let keys = plan_keys(pool, plan_id).await?;
  delete_logs(pool, user_id, &keys, new_total).await?;

  let removed = sqlx::query("DELETE FROM training_weeks WHERE plan_id = ?1 AND week_number > ?2")
    .bind(plan_id)
    .bind(new_total)
    .execute(pool)
    .await?
    .rows_affected();

  info!(plan_id, new_total, removed, "Truncated plan weeks");
  Ok(())
}

/// Per-week values currently stored for the plan, by week number then key
async fn snapshot_week_fields(
  pool: &SqlitePool,
  plan_id: i64,
) -> AppResult<HashMap<i64, HashMap<ExerciseKey, WeekFields>>> {
  #[derive(sqlx::FromRow)]
  struct Row {
    week_number: i64,
    exercise_key: ExerciseKey,
    #[sqlx(flatten)]
    fields: WeekFields,
  }

  let rows = sqlx::query_as::<_, Row>(
    r#"
    SELECT w.week_number, e.exercise_key, e.sets, e.reps, e.rpe, e.progression_type
    FROM exercises e
    JOIN training_days d ON d.id = e.day_id
    JOIN training_weeks w ON w.id = d.week_id
    WHERE w.plan_id = ?
    "#,
  )
  .bind(plan_id)
  .fetch_all(pool)
  .await?;

  let mut snapshot: HashMap<i64, HashMap<ExerciseKey, WeekFields>> = HashMap::new();
  for row in rows {
    snapshot
      .entry(row.week_number)
      .or_default()
      .insert(row.exercise_key, row.fields);
  }
  Ok(snapshot)
}

async fn week_ids(pool: &SqlitePool, plan_id: i64) -> AppResult<Vec<(i64, i64)>> {
  let rows: Vec<(i64, i64)> = sqlx::query_as(
    "SELECT id, week_number FROM training_weeks WHERE plan_id = ? ORDER BY week_number",
  )
  .bind(plan_id)
  .fetch_all(pool)
  .await?;
  Ok(rows)
}

/// Create a plan with `total_weeks` identical weeks built from the day templates.
/// Returns the new plan id.
pub async fn create_plan(pool: &SqlitePool, user_id: i64, new_plan: &NewPlan) -> AppResult<i64> {
  new_plan.validate()?;
  let template = assign_keys(&new_plan.days);
  ensure_keys_available(pool, user_id, None, &template).await?;

  let end_date = TrainingPlan::compute_end_date(new_plan.start_date, new_plan.total_weeks);
  let today = chrono::Utc::now().date_naive();

  let plan_id = sqlx::query(
    r#"
    INSERT INTO training_plans (
      user_id, name, description, total_weeks, current_week,
      start_date, end_date, is_expired
    )
    VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7)
    "#,
  )
  .bind(user_id)
  .bind(new_plan.name.trim())
  .bind(&new_plan.description)
  .bind(new_plan.total_weeks)
  .bind(new_plan.start_date)
  .bind(end_date)
  .bind(TrainingPlan::is_expired_on(end_date, today))
  .execute(pool)
  .await?
  .last_insert_rowid();

  for week_number in 1..=new_plan.total_weeks {
    let week_id = insert_week(pool, plan_id, week_number).await?;
    insert_week_structure(pool, week_id, &template).await?;
  }

  info!(
    plan_id,
    total_weeks = new_plan.total_weeks,
    days = template.len(),
    "Created training plan"
  );
  Ok(plan_id)
}

/// Apply a structural edit: shrink first, rewrite the template week, then
/// regenerate every other week (and any added weeks) from it
pub async fn edit_structure(
  pool: &SqlitePool,
  user_id: i64,
  plan_id: i64,
  edit: &StructureEdit,
) -> AppResult<()> {
  edit.validate()?;
  let plan = get_plan(pool, user_id, plan_id).await?;
  let new_total = edit.total_weeks.unwrap_or(plan.total_weeks);

  let template = assign_keys(&edit.days);
  ensure_keys_available(pool, user_id, Some(plan_id), &template).await?;
  let keys_before = plan_keys(pool, plan_id).await?;

  if new_total < plan.total_weeks {
    truncate_weeks(pool, user_id, plan_id, new_total).await?;
  }

  let snapshot = snapshot_week_fields(pool, plan_id).await?;
  let empty = HashMap::new();

  for (week_id, week_number) in week_ids(pool, plan_id).await? {
    sqlx::query("DELETE FROM training_days WHERE week_id = ?")
      .bind(week_id)
      .execute(pool)
      .await?;

    if week_number == 1 {
      insert_week_structure(pool, week_id, &template).await?;
    } else {
      let prior = snapshot.get(&week_number).unwrap_or(&empty);
      insert_week_structure(pool, week_id, &replicate_week(&template, prior)).await?;
    }
    debug!(plan_id, week_number, "Replicated week");
  }

  for week_number in (plan.total_weeks + 1)..=new_total {
    let week_id = insert_week(pool, plan_id, week_number).await?;
    insert_week_structure(pool, week_id, &template).await?;
  }

  let dropped: HashSet<ExerciseKey> = keys_before
    .difference(&template_keys(&template))
    .cloned()
    .collect();
  if !dropped.is_empty() {
    delete_logs(pool, user_id, &dropped, 0).await?;
  }

  let end_date = TrainingPlan::compute_end_date(plan.start_date, new_total);
  let today = chrono::Utc::now().date_naive();
  sqlx::query(
    r#"
    UPDATE training_plans
    SET total_weeks = ?1, end_date = ?2, is_expired = ?3,
        current_week = MIN(current_week, ?1)
    WHERE id = ?4
    "#,
  )
  .bind(new_total)
  .bind(end_date)
  .bind(TrainingPlan::is_expired_on(end_date, today))
  .bind(plan_id)
  .execute(pool)
  .await?;

  info!(
    plan_id,
    old_weeks = plan.total_weeks,
    new_weeks = new_total,
    dropped_exercises = dropped.len(),
    "Edited plan structure"
  );
  Ok(())
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
