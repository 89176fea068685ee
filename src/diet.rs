//! Diet storage: diets, their meals and foods, and the daily consumption log

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{Diet, DietDetail, DietFoodConsumption, DietMeal, DietMealFood, MealDetail};
use crate::nutrition::{daily_progress, summarize, DailyProgress, DietSummary};

// ---------------------------------------------------------------------------
/// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FoodInput {
  /// Existing food to update in place; new food when absent
  #[serde(default)]
  pub id: Option<i64>,
  pub food_name: String,
  #[serde(default)]
  pub quantity: String,
  #[serde(default)]
  pub protein_animal: f64,
  #[serde(default)]
  pub protein_vegetable: f64,
  #[serde(default)]
  pub carbs: f64,
  #[serde(default)]
  pub fat: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MealInput {
  #[serde(default)]
  pub id: Option<i64>,
  pub name: String,
  #[serde(default)]
  pub foods: Vec<FoodInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDiet {
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub start_date: Option<NaiveDate>,
  #[serde(default)]
  pub meals: Vec<MealInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DietUpdate {
  pub name: Option<String>,
  /// `null` clears the description
  #[serde(default, deserialize_with = "crate::models::nullable")]
  pub description: Option<Option<String>>,
  pub start_date: Option<NaiveDate>,
  pub is_expired: Option<bool>,
}

fn validate_meals(meals: &[MealInput]) -> AppResult<()> {
  for meal in meals {
    if meal.name.trim().is_empty() {
      return Err(AppError::validation("meal name is required"));
    }
    for food in &meal.foods {
      if food.food_name.trim().is_empty() {
        return Err(AppError::validation("food name is required"));
      }
      let macros = [food.protein_animal, food.protein_vegetable, food.carbs, food.fat];
      if macros.iter().any(|grams| !grams.is_finite() || *grams < 0.0) {
        return Err(AppError::validation(format!(
          "macros of {} must be non-negative",
          food.food_name.trim()
        )));
      }
    }
  }
  Ok(())
}

impl NewDiet {
  pub fn validate(&self) -> AppResult<()> {
    if self.name.trim().is_empty() {
      return Err(AppError::validation("diet name is required"));
    }
    validate_meals(&self.meals)
  }
}

// ---------------------------------------------------------------------------
// Database Operations
// ---------------------------------------------------------------------------

pub async fn list_diets(pool: &SqlitePool, user_id: i64) -> AppResult<Vec<Diet>> {
  let diets = sqlx::query_as::<_, Diet>(
    r#"
    SELECT id, user_id, name, description, start_date, is_expired
    FROM diets
    WHERE user_id = ?
    ORDER BY is_expired, created_at DESC, id DESC
    "#,
  )
  .bind(user_id)
  .fetch_all(pool)
  .await?;
  Ok(diets)
}

pub async fn get_diet(pool: &SqlitePool, user_id: i64, diet_id: i64) -> AppResult<Diet> {
  sqlx::query_as::<_, Diet>(
    r#"
    SELECT id, user_id, name, description, start_date, is_expired
    FROM diets
    WHERE id = ?1 AND user_id = ?2
    "#,
  )
  .bind(diet_id)
  .bind(user_id)
  .fetch_optional(pool)
  .await?
  .ok_or_else(|| AppError::not_found("Diet", diet_id))
}

/// The diet with meals in `order_number` order and their foods
pub async fn load_diet_detail(pool: &SqlitePool, user_id: i64, diet_id: i64) -> AppResult<DietDetail> {
  let diet = get_diet(pool, user_id, diet_id).await?;

  let meals = sqlx::query_as::<_, DietMeal>(
    "SELECT id, diet_id, name, order_number FROM diet_meals WHERE diet_id = ? ORDER BY order_number, id",
  )
  .bind(diet_id)
  .fetch_all(pool)
  .await?;

  let foods = sqlx::query_as::<_, DietMealFood>(
    r#"
    SELECT f.id, f.meal_id, f.food_name, f.quantity,
           f.protein_animal, f.protein_vegetable, f.carbs, f.fat
    FROM diet_meal_foods f
    JOIN diet_meals m ON m.id = f.meal_id
    WHERE m.diet_id = ?
    ORDER BY f.id
    "#,
  )
  .bind(diet_id)
  .fetch_all(pool)
  .await?;

  let meals = meals
    .into_iter()
    .map(|meal| MealDetail {
      foods: foods.iter().filter(|food| food.meal_id == meal.id).cloned().collect(),
      meal,
    })
    .collect();

  Ok(DietDetail { diet, meals })
}

pub async fn create_diet(pool: &SqlitePool, user_id: i64, new_diet: &NewDiet) -> AppResult<DietDetail> {
  new_diet.validate()?;

  let diet_id = sqlx::query(
    "INSERT INTO diets (user_id, name, description, start_date) VALUES (?1, ?2, ?3, ?4)",
  )
  .bind(user_id)
  .bind(new_diet.name.trim())
  .bind(&new_diet.description)
  .bind(new_diet.start_date)
  .execute(pool)
  .await?
  .last_insert_rowid();

  info!(diet_id, user_id, "Created diet");
  replace_meals(pool, user_id, diet_id, &new_diet.meals).await
}

pub async fn update_diet(
  pool: &SqlitePool,
  user_id: i64,
  diet_id: i64,
  update: &DietUpdate,
) -> AppResult<Diet> {
  if matches!(&update.name, Some(name) if name.trim().is_empty()) {
    return Err(AppError::validation("diet name is required"));
  }
  let diet = get_diet(pool, user_id, diet_id).await?;

  sqlx::query(
    r#"
    UPDATE diets
    SET name = ?1, description = ?2, start_date = ?3, is_expired = ?4
    WHERE id = ?5
    "#,
  )
  .bind(update.name.as_deref().map(str::trim).unwrap_or(&diet.name))
  .bind(update.description.clone().unwrap_or(diet.description))
  .bind(update.start_date.or(diet.start_date))
  .bind(update.is_expired.unwrap_or(diet.is_expired))
  .bind(diet_id)
  .execute(pool)
  .await?;

  get_diet(pool, user_id, diet_id).await
}

pub async fn delete_diet(pool: &SqlitePool, user_id: i64, diet_id: i64) -> AppResult<()> {
  get_diet(pool, user_id, diet_id).await?;

  sqlx::query("DELETE FROM diets WHERE id = ?")
    .bind(diet_id)
    .execute(pool)
    .await?;

  info!(diet_id, user_id, "Deleted diet");
  Ok(())
}

/// Make the diet's meals match `meals`.
///
/// Meals and foods that carry the id of an existing row of this diet are
/// updated in place, so their consumption history is kept. Rows missing from
/// the input are deleted along with their consumption entries.
pub async fn replace_meals(
  pool: &SqlitePool,
  user_id: i64,
  diet_id: i64,
  meals: &[MealInput],
) -> AppResult<DietDetail> {
  validate_meals(meals)?;
  let current = load_diet_detail(pool, user_id, diet_id).await?;

  let existing_meals: HashSet<i64> = current.meals.iter().map(|m| m.meal.id).collect();
  let existing_foods: HashSet<(i64, i64)> = current
    .meals
    .iter()
    .flat_map(|m| m.foods.iter().map(|f| (f.meal_id, f.id)))
    .collect();

  let mut kept_meals = HashSet::new();
  let mut kept_foods = HashSet::new();

  for (index, meal) in meals.iter().enumerate() {
    let order_number = index as i64 + 1;
    let meal_id = match meal.id.filter(|id| existing_meals.contains(id)) {
      Some(id) => {
        sqlx::query("UPDATE diet_meals SET name = ?1, order_number = ?2 WHERE id = ?3")
          .bind(meal.name.trim())
          .bind(order_number)
          .bind(id)
          .execute(pool)
          .await?;
        id
      }
      None => sqlx::query("INSERT INTO diet_meals (diet_id, name, order_number) VALUES (?1, ?2, ?3)")
        .bind(diet_id)
        .bind(meal.name.trim())
        .bind(order_number)
        .execute(pool)
        .await?
        .last_insert_rowid(),
    };
    kept_meals.insert(meal_id);

    for food in &meal.foods {
      let food_id = match food.id.filter(|id| existing_foods.contains(&(meal_id, *id))) {
        Some(id) => {
          sqlx::query(
            r#"
            UPDATE diet_meal_foods
            SET food_name = ?1, quantity = ?2, protein_animal = ?3,
                protein_vegetable = ?4, carbs = ?5, fat = ?6
            WHERE id = ?7
            "#,
          )
          .bind(food.food_name.trim())
          .bind(food.quantity.trim())
          .bind(food.protein_animal)
          .bind(food.protein_vegetable)
          .bind(food.carbs)
          .bind(food.fat)
          .bind(id)
          .execute(pool)
          .await?;
          id
        }
        None => sqlx::query(
          r#"
          INSERT INTO diet_meal_foods (
            meal_id, food_name, quantity, protein_animal, protein_vegetable, carbs, fat
          )
          VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
          "#,
        )
        .bind(meal_id)
        .bind(food.food_name.trim())
        .bind(food.quantity.trim())
        .bind(food.protein_animal)
        .bind(food.protein_vegetable)
        .bind(food.carbs)
        .bind(food.fat)
        .execute(pool)
        .await?
        .last_insert_rowid(),
      };
      kept_foods.insert(food_id);
    }
  }

  for (_, food_id) in existing_foods.iter().filter(|(_, id)| !kept_foods.contains(id)) {
    sqlx::query("DELETE FROM diet_meal_foods WHERE id = ?")
      .bind(food_id)
      .execute(pool)
      .await?;
  }
  for meal_id in existing_meals.difference(&kept_meals) {
    sqlx::query("DELETE FROM diet_meals WHERE id = ?")
      .bind(meal_id)
      .execute(pool)
      .await?;
  }

  info!(diet_id, meals = meals.len(), "Replaced diet meals");
  load_diet_detail(pool, user_id, diet_id).await
}

/// Flip the consumed flag of a food on a date, creating the log row when needed
pub async fn toggle_consumption(
  pool: &SqlitePool,
  user_id: i64,
  diet_id: i64,
  food_id: i64,
  date: NaiveDate,
) -> AppResult<DietFoodConsumption> {
  let detail = load_diet_detail(pool, user_id, diet_id).await?;
  if !detail.foods().any(|food| food.id == food_id) {
    return Err(AppError::not_found("DietMealFood", food_id));
  }

  let existing = consumption_entry(pool, user_id, food_id, date).await?;
  let is_consumed = !existing.map(|entry| entry.is_consumed).unwrap_or(false);
  let consumed_at = is_consumed.then(Utc::now);

  sqlx::query(
    r#"
    INSERT INTO diet_food_consumption (
      user_id, diet_id, diet_meal_food_id, consumption_date, is_consumed, consumed_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(user_id, diet_meal_food_id, consumption_date) DO UPDATE SET
      is_consumed = excluded.is_consumed,
      consumed_at = excluded.consumed_at
    "#,
  )
  .bind(user_id)
  .bind(diet_id)
  .bind(food_id)
  .bind(date)
  .bind(is_consumed)
  .bind(consumed_at)
  .execute(pool)
  .await?;

  consumption_entry(pool, user_id, food_id, date)
    .await?
    .ok_or_else(|| AppError::Internal("consumption entry missing after upsert".to_string()))
}

async fn consumption_entry(
  pool: &SqlitePool,
  user_id: i64,
  food_id: i64,
  date: NaiveDate,
) -> AppResult<Option<DietFoodConsumption>> {
  let entry = sqlx::query_as::<_, DietFoodConsumption>(
    r#"
    SELECT id, user_id, diet_id, diet_meal_food_id, consumption_date, is_consumed, consumed_at
    FROM diet_food_consumption
    WHERE user_id = ?1 AND diet_meal_food_id = ?2 AND consumption_date = ?3
    "#,
  )
  .bind(user_id)
  .bind(food_id)
  .bind(date)
  .fetch_optional(pool)
  .await?;
  Ok(entry)
}

pub async fn consumption_for_date(
  pool: &SqlitePool,
  user_id: i64,
  diet_id: i64,
  date: NaiveDate,
) -> AppResult<Vec<DietFoodConsumption>> {
  get_diet(pool, user_id, diet_id).await?;

  let entries = sqlx::query_as::<_, DietFoodConsumption>(
    r#"
    SELECT id, user_id, diet_id, diet_meal_food_id, consumption_date, is_consumed, consumed_at
    FROM diet_food_consumption
    WHERE user_id = ?1 AND diet_id = ?2 AND consumption_date = ?3
    ORDER BY diet_meal_food_id
    "#,
  )
  .bind(user_id)
  .bind(diet_id)
  .bind(date)
  .fetch_all(pool)
  .await?;
  Ok(entries)
}

pub async fn diet_summary(pool: &SqlitePool, user_id: i64, diet_id: i64) -> AppResult<DietSummary> {
  let detail = load_diet_detail(pool, user_id, diet_id).await?;
  Ok(summarize(&detail))
}

pub async fn diet_progress(
  pool: &SqlitePool,
  user_id: i64,
  diet_id: i64,
  date: NaiveDate,
) -> AppResult<DailyProgress> {
  let detail = load_diet_detail(pool, user_id, diet_id).await?;
  let log = consumption_for_date(pool, user_id, diet_id, date).await?;
  Ok(daily_progress(&detail, &log, date))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assert_approx_eq;
  use crate::test_utils::{count_rows, seed_test_user, setup_test_db, teardown_test_db};

  fn food(id: Option<i64>, name: &str, protein: f64, carbs: f64, fat: f64) -> FoodInput {
    FoodInput {
      id,
      food_name: name.to_string(),
      quantity: "100g".to_string(),
      protein_animal: protein,
      protein_vegetable: 0.0,
      carbs,
      fat,
    }
  }

  fn new_diet() -> NewDiet {
    NewDiet {
      name: "Cutting".to_string(),
      description: None,
      start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
      meals: vec![
        MealInput {
          id: None,
          name: "Café da manhã".to_string(),
          foods: vec![food(None, "Ovos", 12.0, 1.0, 10.0), food(None, "Pão", 0.0, 30.0, 2.0)],
        },
        MealInput {
          id: None,
          name: "Almoço".to_string(),
          foods: vec![food(None, "Frango", 30.0, 0.0, 3.0)],
        },
      ],
    }
  }

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
  }

  #[tokio::test]
  async fn test_create_diet_orders_meals() {
    let pool = setup_test_db().await;
    let user_id = seed_test_user(&pool, "ana@example.com").await;

    let detail = create_diet(&pool, user_id, &new_diet()).await.unwrap();
    assert_eq!(detail.meals.len(), 2);
    assert_eq!(detail.meals[0].meal.name, "Café da manhã");
    assert_eq!(detail.meals[0].meal.order_number, 1);
    assert_eq!(detail.meals[0].foods.len(), 2);
    assert_eq!(detail.foods().count(), 3);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_replace_meals_keeps_consumption_of_kept_foods() {
    let pool = setup_test_db().await;
    let user_id = seed_test_user(&pool, "ana@example.com").await;
    let detail = create_diet(&pool, user_id, &new_diet()).await.unwrap();
    let diet_id = detail.diet.id;
    let eggs = detail.meals[0].foods[0].clone();
    let bread = detail.meals[0].foods[1].clone();

    toggle_consumption(&pool, user_id, diet_id, eggs.id, today()).await.unwrap();
    toggle_consumption(&pool, user_id, diet_id, bread.id, today()).await.unwrap();

    // Keep breakfast with eggs only (more protein), drop lunch
    let meals = vec![MealInput {
      id: Some(detail.meals[0].meal.id),
      name: "Desjejum".to_string(),
      foods: vec![food(Some(eggs.id), "Ovos", 18.0, 1.5, 15.0)],
    }];
    let updated = replace_meals(&pool, user_id, diet_id, &meals).await.unwrap();

    assert_eq!(updated.meals.len(), 1);
    assert_eq!(updated.meals[0].meal.name, "Desjejum");
    assert_eq!(updated.meals[0].foods[0].id, eggs.id);
    assert_eq!(updated.meals[0].foods[0].protein_animal, 18.0);
    assert_eq!(count_rows(&pool, "diet_meal_foods").await, 1);

    let log = consumption_for_date(&pool, user_id, diet_id, today()).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].diet_meal_food_id, eggs.id);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_foreign_ids_are_inserted_as_new_rows() {
    let pool = setup_test_db().await;
    let user_id = seed_test_user(&pool, "ana@example.com").await;
    let first = create_diet(&pool, user_id, &new_diet()).await.unwrap();
    let second = create_diet(&pool, user_id, &new_diet()).await.unwrap();

    // Ids from another diet must not hijack its rows
    let meals = vec![MealInput {
      id: Some(first.meals[0].meal.id),
      name: "Lanche".to_string(),
      foods: vec![food(Some(first.meals[0].foods[0].id), "Iogurte", 10.0, 8.0, 3.0)],
    }];
    replace_meals(&pool, user_id, second.diet.id, &meals).await.unwrap();

    let untouched = load_diet_detail(&pool, user_id, first.diet.id).await.unwrap();
    assert_eq!(untouched, first);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_toggle_consumption_flips_and_tracks_timestamp() {
    let pool = setup_test_db().await;
    let user_id = seed_test_user(&pool, "ana@example.com").await;
    let detail = create_diet(&pool, user_id, &new_diet()).await.unwrap();
    let food_id = detail.meals[1].foods[0].id;

    let entry = toggle_consumption(&pool, user_id, detail.diet.id, food_id, today())
      .await
      .unwrap();
    assert!(entry.is_consumed);
    assert!(entry.consumed_at.is_some());

    let entry = toggle_consumption(&pool, user_id, detail.diet.id, food_id, today())
      .await
      .unwrap();
    assert!(!entry.is_consumed);
    assert!(entry.consumed_at.is_none());
    assert_eq!(count_rows(&pool, "diet_food_consumption").await, 1);

    let err = toggle_consumption(&pool, user_id, detail.diet.id, 9999, today())
      .await
      .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_progress_counts_only_the_requested_date() {
    let pool = setup_test_db().await;
    let user_id = seed_test_user(&pool, "ana@example.com").await;
    let detail = create_diet(&pool, user_id, &new_diet()).await.unwrap();
    let diet_id = detail.diet.id;

    for food in detail.foods() {
      toggle_consumption(&pool, user_id, diet_id, food.id, today()).await.unwrap();
    }
    let yesterday = today().pred_opt().unwrap();
    toggle_consumption(&pool, user_id, diet_id, detail.meals[0].foods[0].id, yesterday)
      .await
      .unwrap();

    let progress = diet_progress(&pool, user_id, diet_id, today()).await.unwrap();
    assert_approx_eq!(progress.progress_percentage, 100.0, 1e-9);
    assert_eq!(progress.consumed_foods, 3);

    let progress = diet_progress(&pool, user_id, diet_id, yesterday).await.unwrap();
    assert_eq!(progress.consumed_foods, 1);
    assert!(progress.progress_percentage < 100.0);

    let summary = diet_summary(&pool, user_id, diet_id).await.unwrap();
    assert_approx_eq!(summary.total_calories, progress.total_calories, 1e-9);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_invalid_diet_is_rejected_and_delete_cascades() {
    let pool = setup_test_db().await;
    let user_id = seed_test_user(&pool, "ana@example.com").await;

    let mut invalid = new_diet();
    invalid.meals[0].foods[0].carbs = -1.0;
    assert!(matches!(
      create_diet(&pool, user_id, &invalid).await,
      Err(AppError::Validation(_))
    ));
    assert_eq!(count_rows(&pool, "diets").await, 0);

    let detail = create_diet(&pool, user_id, &new_diet()).await.unwrap();
    let updated = update_diet(
      &pool,
      user_id,
      detail.diet.id,
      &DietUpdate {
        description: Some(Some("Déficit leve".to_string())),
        is_expired: Some(true),
        ..Default::default()
      },
    )
    .await
    .unwrap();
    assert!(updated.is_expired);
    assert_eq!(updated.name, "Cutting");
    assert_eq!(updated.description.as_deref(), Some("Déficit leve"));

    let clear: DietUpdate = serde_json::from_str(r#"{"description": null}"#).unwrap();
    let updated = update_diet(&pool, user_id, detail.diet.id, &clear).await.unwrap();
    assert_eq!(updated.description, None);
    assert!(updated.is_expired);

    delete_diet(&pool, user_id, detail.diet.id).await.unwrap();
    assert_eq!(count_rows(&pool, "diet_meals").await, 0);
    assert_eq!(count_rows(&pool, "diet_meal_foods").await, 0);

    teardown_test_db(pool).await;
  }
}
