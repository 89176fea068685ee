//! Data export and import
//!
//! Export dumps every training and diet row the user owns as one JSON
//! document. Import re-inserts such a document under the importing user:
//! every row gets a fresh id, every foreign key is remapped through the ids
//! assigned during the same import, and exercise keys are regenerated.
//!
//! Import is tolerant of missing collections. A row whose parent is not in
//! the document is skipped with a warning. Inserts run one at a time without
//! a transaction; the first store error stops the import.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::auth::get_profile;
use crate::error::AppResult;
use crate::models::{
  Diet, DietFoodConsumption, DietMeal, DietMealFood, Exercise, ExerciseKey, ExerciseObservation,
  ExerciseSet, Profile, TrainingDay, TrainingPlan, TrainingWeek,
};

pub const EXPORT_VERSION: &str = "1.0";
pub const EXPORT_APP: &str = "fitness-planner";

// ---------------------------------------------------------------------------
/// Document shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportInfo {
  pub version: String,
  pub exported_at: DateTime<Utc>,
  pub app: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingData {
  #[serde(default)]
  pub training_plans: Vec<TrainingPlan>,
  #[serde(default)]
  pub training_weeks: Vec<TrainingWeek>,
  #[serde(default)]
  pub training_days: Vec<TrainingDay>,
  #[serde(default)]
  pub exercises: Vec<Exercise>,
  #[serde(default)]
  pub exercise_sets: Vec<ExerciseSet>,
  #[serde(default)]
  pub exercise_observations: Vec<ExerciseObservation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DietData {
  #[serde(default)]
  pub diets: Vec<Diet>,
  #[serde(default)]
  pub diet_meals: Vec<DietMeal>,
  #[serde(default)]
  pub diet_meal_foods: Vec<DietMealFood>,
  #[serde(default)]
  pub diet_food_consumption: Vec<DietFoodConsumption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
  #[serde(default)]
  pub export_info: Option<ExportInfo>,
  #[serde(default)]
  pub profile: Option<Profile>,
  #[serde(default)]
  pub training_data: TrainingData,
  #[serde(default)]
  pub diet_data: DietData,
}

/// Rows inserted per collection, plus rows skipped for a missing parent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
  pub training_plans: usize,
  pub training_weeks: usize,
  pub training_days: usize,
  pub exercises: usize,
  pub exercise_sets: usize,
  pub exercise_observations: usize,
  pub diets: usize,
  pub diet_meals: usize,
  pub diet_meal_foods: usize,
  pub diet_food_consumption: usize,
  pub skipped: usize,
}

// ---------------------------------------------------------------------------
/// Export
// ---------------------------------------------------------------------------

pub async fn export_data(pool: &SqlitePool, user_id: i64) -> AppResult<ExportDocument> {
  let profile = get_profile(pool, user_id).await?;

  let training_plans = sqlx::query_as::<_, TrainingPlan>(
    r#"
    SELECT id, user_id, name, description, total_weeks, current_week,
           start_date, end_date, is_expired
    FROM training_plans
    WHERE user_id = ?
    ORDER BY id
    "#,
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  let training_weeks = sqlx::query_as::<_, TrainingWeek>(
    r#"
    SELECT w.id, w.plan_id, w.week_number, w.is_deload
    FROM training_weeks w
    JOIN training_plans p ON p.id = w.plan_id
    WHERE p.user_id = ?
    ORDER BY w.id
    "#,
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  let training_days = sqlx::query_as::<_, TrainingDay>(
    r#"
    SELECT d.id, d.week_id, d.day_number, d.name
    FROM training_days d
    JOIN training_weeks w ON w.id = d.week_id
    JOIN training_plans p ON p.id = w.plan_id
    WHERE p.user_id = ?
    ORDER BY d.id
    "#,
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  let exercises = sqlx::query_as::<_, Exercise>(
    r#"
    SELECT e.id, e.day_id, e.exercise_key, e.name, e.sets, e.reps, e.rpe,
           e.progression_type, e.technique, e.technique_description, e.order_number
    FROM exercises e
    JOIN training_days d ON d.id = e.day_id
    JOIN training_weeks w ON w.id = d.week_id
    JOIN training_plans p ON p.id = w.plan_id
    WHERE p.user_id = ?
    ORDER BY e.id
    "#,
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  let exercise_sets = sqlx::query_as::<_, ExerciseSet>(
    r#"
    SELECT id, user_id, exercise_key, week_number, set_number, weight, reps
    FROM exercise_sets
    WHERE user_id = ?
    ORDER BY id
    "#,
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  let exercise_observations = sqlx::query_as::<_, ExerciseObservation>(
    r#"
    SELECT id, user_id, exercise_key, week_number, observations, is_completed
    FROM exercise_observations
    WHERE user_id = ?
    ORDER BY id
    "#,
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  let diets = sqlx::query_as::<_, Diet>(
    "SELECT id, user_id, name, description, start_date, is_expired FROM diets WHERE user_id = ? ORDER BY id",
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  let diet_meals = sqlx::query_as::<_, DietMeal>(
    r#"
    SELECT m.id, m.diet_id, m.name, m.order_number
    FROM diet_meals m
    JOIN diets d ON d.id = m.diet_id
    WHERE d.user_id = ?
    ORDER BY m.id
    "#,
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  let diet_meal_foods = sqlx::query_as::<_, DietMealFood>(
    r#"
    SELECT f.id, f.meal_id, f.food_name, f.quantity,
           f.protein_animal, f.protein_vegetable, f.carbs, f.fat
    FROM diet_meal_foods f
    JOIN diet_meals m ON m.id = f.meal_id
    JOIN diets d ON d.id = m.diet_id
    WHERE d.user_id = ?
    ORDER BY f.id
    "#,
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  let diet_food_consumption = sqlx::query_as::<_, DietFoodConsumption>(
    r#"
    SELECT id, user_id, diet_id, diet_meal_food_id, consumption_date, is_consumed, consumed_at
    FROM diet_food_consumption
    WHERE user_id = ?
    ORDER BY id
    "#,
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;

  info!(
    user_id,
    plans = training_plans.len(),
    diets = diets.len(),
    "Exported user data"
  );

  Ok(ExportDocument {
    export_info: Some(ExportInfo {
      version: EXPORT_VERSION.to_string(),
      exported_at: Utc::now(),
      app: EXPORT_APP.to_string(),
    }),
    profile: Some(profile),
    training_data: TrainingData {
      training_plans,
      training_weeks,
      training_days,
      exercises,
      exercise_sets,
      exercise_observations,
    },
    diet_data: DietData {
      diets,
      diet_meals,
      diet_meal_foods,
      diet_food_consumption,
    },
  })
}

// ---------------------------------------------------------------------------
/// Import
// ---------------------------------------------------------------------------

/// Look up the new id of a parent row, warning when the parent is missing
fn parent(map: &HashMap<i64, i64>, old_id: i64, collection: &str, row_id: i64) -> Option<i64> {
  let new_id = map.get(&old_id).copied();
  if new_id.is_none() {
    warn!(collection, row_id, parent_id = old_id, "Skipping row with missing parent");
  }
  new_id
}

fn parent_key(
  keys: &HashMap<ExerciseKey, ExerciseKey>,
  old_key: &ExerciseKey,
  collection: &str,
  row_id: i64,
) -> Option<ExerciseKey> {
  let new_key = keys.get(old_key).cloned();
  if new_key.is_none() {
    warn!(collection, row_id, exercise_key = %old_key, "Skipping row with unknown exercise key");
  }
  new_key
}

pub async fn import_data(pool: &SqlitePool, user_id: i64, doc: &ExportDocument) -> AppResult<ImportReport> {
  let mut report = ImportReport::default();
  let training = &doc.training_data;
  let diet = &doc.diet_data;

  if let Some(export_info) = &doc.export_info {
    info!(
      user_id,
      version = %export_info.version,
      exported_at = %export_info.exported_at,
      "Importing data"
    );
  }

  // Training plans
  let mut plan_ids = HashMap::new();
  for plan in &training.training_plans {
    let new_id = sqlx::query(
      r#"
      INSERT INTO training_plans (
        user_id, name, description, total_weeks, current_week,
        start_date, end_date, is_expired
      )
      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
      "#,
    )
    .bind(user_id)
    .bind(&plan.name)
    .bind(&plan.description)
    .bind(plan.total_weeks)
    .bind(plan.current_week)
    .bind(plan.start_date)
    .bind(TrainingPlan::compute_end_date(plan.start_date, plan.total_weeks))
    .bind(plan.is_expired)
    .execute(pool)
    .await?
    .last_insert_rowid();
    plan_ids.insert(plan.id, new_id);
    report.training_plans += 1;
  }

  let mut week_ids = HashMap::new();
  for week in &training.training_weeks {
    let Some(plan_id) = parent(&plan_ids, week.plan_id, "training_weeks", week.id) else {
      report.skipped += 1;
      continue;
    };
    let new_id = sqlx::query(
      "INSERT INTO training_weeks (plan_id, week_number, is_deload) VALUES (?1, ?2, ?3)",
    )
    .bind(plan_id)
    .bind(week.week_number)
    .bind(week.is_deload)
    .execute(pool)
    .await?
    .last_insert_rowid();
    week_ids.insert(week.id, new_id);
    report.training_weeks += 1;
  }

  let mut day_ids = HashMap::new();
  for day in &training.training_days {
    let Some(week_id) = parent(&week_ids, day.week_id, "training_days", day.id) else {
      report.skipped += 1;
      continue;
    };
    let new_id = sqlx::query(
      "INSERT INTO training_days (week_id, day_number, name) VALUES (?1, ?2, ?3)",
    )
    .bind(week_id)
    .bind(day.day_number)
    .bind(&day.name)
    .execute(pool)
    .await?
    .last_insert_rowid();
    day_ids.insert(day.id, new_id);
    report.training_days += 1;
  }

  // One fresh key per imported key, shared by every week's copy
  let mut keys: HashMap<ExerciseKey, ExerciseKey> = HashMap::new();
  for exercise in &training.exercises {
    let Some(day_id) = parent(&day_ids, exercise.day_id, "exercises", exercise.id) else {
      report.skipped += 1;
      continue;
    };
    let key = keys
      .entry(exercise.exercise_key.clone())
      .or_insert_with(ExerciseKey::generate)
      .clone();

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
    .bind(&key)
    .bind(&exercise.name)
    .bind(exercise.sets)
    .bind(&exercise.reps)
    .bind(exercise.rpe)
    .bind(exercise.progression_type)
    .bind(&exercise.technique)
    .bind(&exercise.technique_description)
    .bind(exercise.order_number)
    .execute(pool)
    .await?;
    report.exercises += 1;
  }

  for set in &training.exercise_sets {
    let Some(key) = parent_key(&keys, &set.exercise_key, "exercise_sets", set.id) else {
      report.skipped += 1;
      continue;
    };
    sqlx::query(
      r#"
      INSERT INTO exercise_sets (user_id, exercise_key, week_number, set_number, weight, reps)
      VALUES (?1, ?2, ?3, ?4, ?5, ?6)
      "#,
    )
    .bind(user_id)
    .bind(&key)
    .bind(set.week_number)
    .bind(set.set_number)
    .bind(set.weight)
    .bind(set.reps)
    .execute(pool)
    .await?;
    report.exercise_sets += 1;
  }

  for observation in &training.exercise_observations {
    let Some(key) = parent_key(
      &keys,
      &observation.exercise_key,
      "exercise_observations",
      observation.id,
    ) else {
      report.skipped += 1;
      continue;
    };
    sqlx::query(
      r#"
      INSERT INTO exercise_observations (user_id, exercise_key, week_number, observations, is_completed)
      VALUES (?1, ?2, ?3, ?4, ?5)
      "#,
    )
    .bind(user_id)
    .bind(&key)
    .bind(observation.week_number)
    .bind(&observation.observations)
    .bind(observation.is_completed)
    .execute(pool)
    .await?;
    report.exercise_observations += 1;
  }

  // Diets
  let mut diet_ids = HashMap::new();
  for row in &diet.diets {
    let new_id = sqlx::query(
      "INSERT INTO diets (user_id, name, description, start_date, is_expired) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(user_id)
    .bind(&row.name)
    .bind(&row.description)
    .bind(row.start_date)
    .bind(row.is_expired)
    .execute(pool)
    .await?
    .last_insert_rowid();
    diet_ids.insert(row.id, new_id);
    report.diets += 1;
  }

  let mut meal_ids = HashMap::new();
  for meal in &diet.diet_meals {
    let Some(diet_id) = parent(&diet_ids, meal.diet_id, "diet_meals", meal.id) else {
      report.skipped += 1;
      continue;
    };
    let new_id = sqlx::query(
      "INSERT INTO diet_meals (diet_id, name, order_number) VALUES (?1, ?2, ?3)",
    )
    .bind(diet_id)
    .bind(&meal.name)
    .bind(meal.order_number)
    .execute(pool)
    .await?
    .last_insert_rowid();
    meal_ids.insert(meal.id, new_id);
    report.diet_meals += 1;
  }

  let mut food_ids = HashMap::new();
  for food in &diet.diet_meal_foods {
    let Some(meal_id) = parent(&meal_ids, food.meal_id, "diet_meal_foods", food.id) else {
      report.skipped += 1;
      continue;
    };
    let new_id = sqlx::query(
      r#"
      INSERT INTO diet_meal_foods (
        meal_id, food_name, quantity, protein_animal, protein_vegetable, carbs, fat
      )
      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
      "#,
    )
    .bind(meal_id)
    .bind(&food.food_name)
    .bind(&food.quantity)
    .bind(food.protein_animal)
    .bind(food.protein_vegetable)
    .bind(food.carbs)
    .bind(food.fat)
    .execute(pool)
    .await?
    .last_insert_rowid();
    food_ids.insert(food.id, new_id);
    report.diet_meal_foods += 1;
  }

  for entry in &diet.diet_food_consumption {
    let parents = parent(&diet_ids, entry.diet_id, "diet_food_consumption", entry.id).zip(
      parent(&food_ids, entry.diet_meal_food_id, "diet_food_consumption", entry.id),
    );
    let Some((diet_id, food_id)) = parents else {
      report.skipped += 1;
      continue;
    };
    sqlx::query(
      r#"
      INSERT INTO diet_food_consumption (
        user_id, diet_id, diet_meal_food_id, consumption_date, is_consumed, consumed_at
      )
      VALUES (?1, ?2, ?3, ?4, ?5, ?6)
      "#,
    )
    .bind(user_id)
    .bind(diet_id)
    .bind(food_id)
    .bind(entry.consumption_date)
    .bind(entry.is_consumed)
    .bind(entry.consumed_at)
    .execute(pool)
    .await?;
    report.diet_food_consumption += 1;
  }

  info!(
    user_id,
    plans = report.training_plans,
    exercises = report.exercises,
    diets = report.diets,
    skipped = report.skipped,
    "Imported data"
  );
  Ok(report)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::replication::{create_plan, NewPlan};
  use crate::test_utils::{
    count_rows, day_template, exercise_template, log_test_set, seed_test_diet, seed_test_user,
    setup_test_db, teardown_test_db,
  };
  use chrono::NaiveDate;

  async fn seed_everything(pool: &SqlitePool, user_id: i64) {
    let plan = NewPlan {
      name: "Força".to_string(),
      description: None,
      total_weeks: 2,
      start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
      days: vec![day_template(1, "Lower", vec![exercise_template(Some("squat"), "Squat")])],
    };
    create_plan(pool, user_id, &plan).await.unwrap();
    log_test_set(pool, user_id, "squat", 1, 1, Some(100.0), Some(5)).await;
    log_test_set(pool, user_id, "squat", 2, 1, Some(105.0), Some(5)).await;

    let (diet_id, food_ids) = seed_test_diet(pool, user_id, &[("Ovos", 12.0, 0.0, 1.0, 10.0)]).await;
    sqlx::query(
      r#"
      INSERT INTO diet_food_consumption (user_id, diet_id, diet_meal_food_id, consumption_date, is_consumed)
      VALUES (?1, ?2, ?3, '2024-01-02', 1)
      "#,
    )
    .bind(user_id)
    .bind(diet_id)
    .bind(food_ids[0])
    .execute(pool)
    .await
    .unwrap();
  }

  #[tokio::test]
  async fn test_export_has_documented_shape() {
    let pool = setup_test_db().await;
    let user_id = seed_test_user(&pool, "ana@example.com").await;
    seed_everything(&pool, user_id).await;

    let doc = export_data(&pool, user_id).await.unwrap();
    let json = serde_json::to_value(&doc).unwrap();

    assert_eq!(json["export_info"]["version"], EXPORT_VERSION);
    assert_eq!(json["export_info"]["app"], EXPORT_APP);
    assert_eq!(json["profile"]["email"], "ana@example.com");
    assert_eq!(json["training_data"]["training_plans"].as_array().unwrap().len(), 1);
    assert_eq!(json["training_data"]["training_weeks"].as_array().unwrap().len(), 2);
    assert_eq!(json["training_data"]["exercises"].as_array().unwrap().len(), 2);
    assert_eq!(json["training_data"]["exercise_sets"].as_array().unwrap().len(), 2);
    assert!(json["training_data"]["exercise_observations"].is_array());
    assert_eq!(json["diet_data"]["diet_meal_foods"].as_array().unwrap().len(), 1);
    assert_eq!(json["diet_data"]["diet_food_consumption"].as_array().unwrap().len(), 1);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_import_remaps_ids_and_keys() {
    let pool = setup_test_db().await;
    let source = seed_test_user(&pool, "ana@example.com").await;
    let target = seed_test_user(&pool, "bia@example.com").await;
    seed_everything(&pool, source).await;

    let doc = export_data(&pool, source).await.unwrap();
    let report = import_data(&pool, target, &doc).await.unwrap();

    assert_eq!(report.training_plans, 1);
    assert_eq!(report.training_weeks, 2);
    assert_eq!(report.exercises, 2);
    assert_eq!(report.exercise_sets, 2);
    assert_eq!(report.diet_food_consumption, 1);
    assert_eq!(report.skipped, 0);

    let imported = export_data(&pool, target).await.unwrap();
    let exercises = &imported.training_data.exercises;
    assert_eq!(exercises.len(), 2);
    assert_eq!(exercises[0].exercise_key, exercises[1].exercise_key);
    assert_ne!(exercises[0].exercise_key, ExerciseKey::from("squat"));
    assert!(imported.training_data.exercise_sets.iter().all(|s| s.exercise_key == exercises[0].exercise_key));

    let old_plan = doc.training_data.training_plans[0].id;
    assert_ne!(imported.training_data.training_plans[0].id, old_plan);
    assert_eq!(
      imported.diet_data.diet_food_consumption[0].diet_meal_food_id,
      imported.diet_data.diet_meal_foods[0].id
    );

    // Source data untouched
    assert_eq!(export_data(&pool, source).await.unwrap().training_data, doc.training_data);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_import_tolerates_partial_documents_and_orphans() {
    let pool = setup_test_db().await;
    let user_id = seed_test_user(&pool, "ana@example.com").await;

    let doc: ExportDocument = serde_json::from_value(serde_json::json!({
      "diet_data": {
        "diets": [
          { "id": 7, "user_id": 99, "name": "Bulking", "description": null,
            "start_date": null, "is_expired": false }
        ],
        "diet_meals": [
          { "id": 1, "diet_id": 7, "name": "Jantar", "order_number": 1 },
          { "id": 2, "diet_id": 8, "name": "Órfã", "order_number": 2 }
        ]
      }
    }))
    .unwrap();

    let report = import_data(&pool, user_id, &doc).await.unwrap();
    assert_eq!(report.diets, 1);
    assert_eq!(report.diet_meals, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.training_plans, 0);
    assert_eq!(count_rows(&pool, "diet_meals").await, 1);

    let owner: i64 = sqlx::query_scalar("SELECT user_id FROM diets")
      .fetch_one(&pool)
      .await
      .unwrap();
    assert_eq!(owner, user_id);

    teardown_test_db(pool).await;
  }
}
