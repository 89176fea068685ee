//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Seed helpers for users, plans, logs and diets
//! - Helper assertions

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::models::{ExerciseKey, ProgressionType};
use crate::replication::{DayTemplate, ExerciseTemplate};

/// Password every seeded user signs in with
pub const TEST_PASSWORD: &str = "correct-horse";

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  // Run migrations
  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// Count rows in a table
pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
  sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
    .fetch_one(pool)
    .await
    .expect("Failed to count rows")
}

/// Seed a user whose password is `TEST_PASSWORD`
/// Returns the user id
pub async fn seed_test_user(pool: &SqlitePool, email: &str) -> i64 {
  let password_hash = bcrypt::hash(TEST_PASSWORD, 4).expect("Failed to hash test password");
  let display_name = email.split('@').next().unwrap_or(email);

  sqlx::query(
    r#"
    INSERT INTO users (email, display_name, password_hash)
    VALUES (?1, ?2, ?3)
    "#,
  )
  .bind(email)
  .bind(display_name)
  .bind(password_hash)
  .execute(pool)
  .await
  .expect("Failed to seed test user")
  .last_insert_rowid()
}

/// Seed a logged set for an exercise key and week
pub async fn log_test_set(
  pool: &SqlitePool,
  user_id: i64,
  exercise_key: &str,
  week_number: i64,
  set_number: i64,
  weight: Option<f64>,
  reps: Option<i64>,
) {
  sqlx::query(
    r#"
    INSERT INTO exercise_sets (user_id, exercise_key, week_number, set_number, weight, reps)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    "#,
  )
  .bind(user_id)
  .bind(exercise_key)
  .bind(week_number)
  .bind(set_number)
  .bind(weight)
  .bind(reps)
  .execute(pool)
  .await
  .expect("Failed to seed exercise set");
}

/// Seed an observation for an exercise key and week
pub async fn log_test_observation(pool: &SqlitePool, user_id: i64, exercise_key: &str, week_number: i64, text: &str) {
  sqlx::query(
    "INSERT INTO exercise_observations (user_id, exercise_key, week_number, observations) VALUES (?1, ?2, ?3, ?4)",
  )
  .bind(user_id)
  .bind(exercise_key)
  .bind(week_number)
  .bind(text)
  .execute(pool)
  .await
  .expect("Failed to seed exercise observation");
}

/// Seed a diet with one meal holding the given foods
/// `(food_name, protein_animal, protein_vegetable, carbs, fat)`
/// Returns (diet id, food ids)
pub async fn seed_test_diet(
  pool: &SqlitePool,
  user_id: i64,
  foods: &[(&str, f64, f64, f64, f64)],
) -> (i64, Vec<i64>) {
  let diet_id = sqlx::query("INSERT INTO diets (user_id, name, start_date) VALUES (?1, ?2, ?3)")
    .bind(user_id)
    .bind("Cutting")
    .bind(NaiveDate::from_ymd_opt(2024, 1, 1))
    .execute(pool)
    .await
    .expect("Failed to seed diet")
    .last_insert_rowid();

  let meal_id = sqlx::query("INSERT INTO diet_meals (diet_id, name, order_number) VALUES (?1, ?2, 1)")
    .bind(diet_id)
    .bind("Café da manhã")
    .execute(pool)
    .await
    .expect("Failed to seed meal")
    .last_insert_rowid();

  let mut food_ids = Vec::new();
  for (name, protein_animal, protein_vegetable, carbs, fat) in foods {
    let result = sqlx::query(
      r#"
      INSERT INTO diet_meal_foods (
        meal_id, food_name, quantity, protein_animal, protein_vegetable, carbs, fat
      )
      VALUES (?1, ?2, '100g', ?3, ?4, ?5, ?6)
      "#,
    )
    .bind(meal_id)
    .bind(*name)
    .bind(*protein_animal)
    .bind(*protein_vegetable)
    .bind(*carbs)
    .bind(*fat)
    .execute(pool)
    .await
    .expect("Failed to seed food");
    food_ids.push(result.last_insert_rowid());
  }

  (diet_id, food_ids)
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// 3 x 8-12 @ RPE 8, linear progression
pub fn exercise_template(key: Option<&str>, name: &str) -> ExerciseTemplate {
  ExerciseTemplate {
    key: key.map(ExerciseKey::from),
    name: name.to_string(),
    sets: 3,
    reps: "8-12".to_string(),
    rpe: Some(8.0),
    progression_type: ProgressionType::Linear,
    technique: None,
    technique_description: None,
  }
}

pub fn day_template(day_number: i64, name: &str, exercises: Vec<ExerciseTemplate>) -> DayTemplate {
  DayTemplate {
    day_number,
    name: name.to_string(),
    exercises,
  }
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    // Verify key tables exist
    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('users', 'training_plans', 'exercise_sets', 'diets')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 4, "Expected 4 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_diet_returns_food_ids() {
    let pool = setup_test_db().await;
    let user_id = seed_test_user(&pool, "ana@example.com").await;

    let (_, food_ids) = seed_test_diet(
      &pool,
      user_id,
      &[("Ovos", 12.0, 0.0, 1.0, 10.0), ("Aveia", 0.0, 5.0, 30.0, 3.0)],
    )
    .await;
    assert_eq!(food_ids.len(), 2);
    assert_eq!(count_rows(&pool, "diet_meal_foods").await, 2);

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_exercise_template_defaults() {
    let template = exercise_template(Some("squat"), "Squat");
    assert_eq!(template.key, Some(ExerciseKey::from("squat")));
    assert_eq!(template.sets, 3);
    assert_eq!(template.progression_type, ProgressionType::Linear);
  }
}
