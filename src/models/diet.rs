use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Diet {
  pub id: i64,
  pub user_id: i64,
  pub name: String,
  pub description: Option<String>,
  pub start_date: Option<NaiveDate>,
  pub is_expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DietMeal {
  pub id: i64,
  pub diet_id: i64,
  pub name: String,
  pub order_number: i64,
}

/// A food line inside a meal. Macros are grams for the stated quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DietMealFood {
  pub id: i64,
  pub meal_id: i64,
  pub food_name: String,
  pub quantity: String,
  pub protein_animal: f64,
  pub protein_vegetable: f64,
  pub carbs: f64,
  pub fat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DietFoodConsumption {
  pub id: i64,
  pub user_id: i64,
  pub diet_id: i64,
  pub diet_meal_food_id: i64,
  pub consumption_date: NaiveDate,
  pub is_consumed: bool,
  pub consumed_at: Option<DateTime<Utc>>,
}

/// A meal with its foods, ordered by food id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealDetail {
  #[serde(flatten)]
  pub meal: DietMeal,
  pub foods: Vec<DietMealFood>,
}

/// A diet with its meals ordered by `order_number`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietDetail {
  #[serde(flatten)]
  pub diet: Diet,
  pub meals: Vec<MealDetail>,
}

impl DietDetail {
  pub fn foods(&self) -> impl Iterator<Item = &DietMealFood> {
    self.meals.iter().flat_map(|meal| meal.foods.iter())
  }
}
